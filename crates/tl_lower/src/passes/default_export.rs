//! Default-export binding.
//!
//! `export default <expr>` has no local binding of its own; the linker
//! records it under the reserved `*default*` name. This pass binds the
//! value to a module variable so the back end can address it like any
//! other export:
//!
//! ```ts
//! export default compute();
//! // becomes
//! const __default0 = compute();
//! export { __default0 as default };
//! ```
//!
//! Anonymous default functions and classes are given a minted name. The
//! module record follows the tree: the `*default*` entry is replaced by a
//! local export of the new name.

use rustc_hash::FxHashSet;
use swc_common::{Span, Spanned};
use tl_ast::*;
use tl_module::ExportEntry;
use tl_parser::{Fragment, FragmentKind};

use crate::{
    context::LoweringContext,
    pass::{LoweringPass, PassError, PassOutcome, Postcondition},
    program::Program,
    rewrite::{rewrite, Rewrite, Traversal},
    template::{Subst, Template},
};

const NAME: &str = "default-export-binding";

const BIND_DEFAULT: Template = Template::new(
    "const $1 = $2;\nexport { $1 as default };",
    FragmentKind::Items,
);

pub struct DefaultExportBinding;

impl LoweringPass for DefaultExportBinding {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &mut LoweringContext, program: &mut Program) -> Result<PassOutcome, PassError> {
        let targets: FxHashSet<Span> = program
            .module
            .body
            .iter()
            .filter(|item| is_unbound_default(item))
            .map(|item| item.span())
            .collect();
        if targets.is_empty() {
            return Ok(PassOutcome::Unchanged);
        }

        let root = ctx.scopes().root();
        let mut bound: Vec<(String, Span)> = Vec::new();
        let mut implementation: Option<Ident> = None;
        rewrite(&mut program.module, ctx, Traversal::PreOrder, |ctx, item: &ModuleItem| {
            if !targets.contains(&item.span()) || !is_unbound_default(item) {
                return Ok(Rewrite::Keep);
            }
            let ModuleItem::ModuleDecl(decl) = item else {
                return Ok(Rewrite::Keep);
            };
            let name = ctx.gensym("default");
            let items = match decl {
                ModuleDecl::ExportDefaultExpr(export) => {
                    let subs = [Subst::Ident(name.clone()), Subst::Expr(export.expr.clone())];
                    match ctx.synthesize(&BIND_DEFAULT, &subs, root)? {
                        Fragment::Items(items) => items,
                        _ => {
                            return Err(PassError::Internal {
                                pass: NAME,
                                reason: "default binding template did not produce items".into(),
                            })
                        }
                    }
                }
                ModuleDecl::ExportDefaultDecl(export) => {
                    let mut named = export.clone();
                    match &mut named.decl {
                        DefaultDecl::Fn(f) => {
                            f.ident = Some(name.clone());
                            implementation = Some(name.clone());
                        }
                        DefaultDecl::Class(c) => c.ident = Some(name.clone()),
                        _ => {}
                    }
                    let fragment = Fragment::Items(vec![ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(named))]);
                    ctx.check(&fragment, root)
                        .map_err(|source| PassError::Synthesis { pass: NAME, source })?;
                    match fragment {
                        Fragment::Items(items) => items,
                        _ => Vec::new(),
                    }
                }
                _ => return Ok(Rewrite::Keep),
            };
            tracing::debug!(name = %name.sym, "bound default export");
            bound.push((name.sym.to_string(), item.span()));
            Ok(Rewrite::Expand(items))
        })?;

        // Overload signatures must carry the implementation's name.
        if let Some(name) = implementation {
            for item in &mut program.module.body {
                if let Some(overload) = anonymous_overload(item) {
                    overload.ident = Some(name.clone());
                }
            }
        }

        ctx.scopes_mut().remove_value(root, DEFAULT_LOCAL_NAME);
        program.record.remove_default_local_export_entry();
        for (name, span) in bound {
            let entry = ExportEntry::local(DEFAULT_EXTERNAL_NAME, name.clone(), span, span);
            if !program.record.add_local_export_entry(entry) {
                return Err(PassError::Internal {
                    pass: NAME,
                    reason: format!("binding `{name}` clashes with an existing default export"),
                });
            }
        }
        Ok(PassOutcome::Changed)
    }

    fn postcondition(&self) -> Option<Postcondition> {
        Some(defaults_are_bound)
    }
}

fn defaults_are_bound(_: &LoweringContext, program: &Program) -> bool {
    !program.record.local_exports().contains_key(DEFAULT_LOCAL_NAME)
        && !program.module.body.iter().any(is_unbound_default)
}

/// `export default <expr>`, or a default function or class without a name.
/// Bodiless overload signatures bind nothing on their own.
fn is_unbound_default(item: &ModuleItem) -> bool {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(_)) => true,
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match &export.decl {
            DefaultDecl::Fn(f) => f.ident.is_none() && f.function.body.is_some(),
            DefaultDecl::Class(c) => c.ident.is_none(),
            _ => false,
        },
        _ => false,
    }
}

fn anonymous_overload(item: &mut ModuleItem) -> Option<&mut FnExpr> {
    match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match &mut export.decl {
            DefaultDecl::Fn(f) if f.ident.is_none() && f.function.body.is_none() => Some(f),
            _ => None,
        },
        _ => None,
    }
}
