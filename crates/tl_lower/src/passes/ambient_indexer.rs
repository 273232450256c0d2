//! Ambient indexers.
//!
//! An index signature in an ambient class or interface (declared with
//! `declare`, or sitting in a `declare` namespace),
//!
//! ```ts
//! declare class Vec { [index: number]: string; }
//! ```
//!
//! is replaced by bodiless accessor members named `$_get` and `$_set`:
//!
//! ```ts
//! declare class Vec {
//!     $_get(index: number): string;
//!     $_set(index: number, value: string): void;
//! }
//! ```
//!
//! A `readonly` indexer gets `$_get` only. A key type that does not resolve
//! falls back to `number`; an element type that does not resolve drops the
//! indexer. Index signatures of ordinary classes and interfaces are left
//! alone. An ambient body may hold one indexer at most; [`crowded_bodies`]
//! lets the driver reject the others at their source position.

use rustc_hash::FxHashSet;
use swc_common::Span;
use swc_ecma_visit::{Visit, VisitWith};
use tl_ast::*;
use tl_parser::{Fragment, FragmentKind};

use crate::{
    context::LoweringContext,
    pass::{LoweringPass, PassError, PassOutcome, Postcondition},
    program::Program,
    rewrite::{rewrite, Rewrite, Traversal},
    template::{Subst, Template},
};

const NAME: &str = "ambient-indexer-lowering";

const ACCESSORS: &str = "$_get(index: $1): $2;\n$_set(index: $1, value: $2): void;";
const GETTER: &str = "$_get(index: $1): $2;";

const CLASS_ACCESSORS: Template = Template::new(ACCESSORS, FragmentKind::ClassMembers);
const CLASS_GETTER: Template = Template::new(GETTER, FragmentKind::ClassMembers);
const INTERFACE_ACCESSORS: Template = Template::new(ACCESSORS, FragmentKind::TypeElements);
const INTERFACE_GETTER: Template = Template::new(GETTER, FragmentKind::TypeElements);

pub struct AmbientIndexerLowering;

impl LoweringPass for AmbientIndexerLowering {
    fn name(&self) -> &'static str {
        NAME
    }

    fn run(&self, ctx: &mut LoweringContext, program: &mut Program) -> Result<PassOutcome, PassError> {
        let placeholders = Placeholders::collect(&program.module);
        if let Some(&(_, count)) = placeholders.crowded.first() {
            return Err(PassError::Precondition {
                pass: NAME,
                reason: format!("a single body declares {count} ambient indexers"),
            });
        }
        if placeholders.is_empty() {
            return Ok(PassOutcome::Unchanged);
        }

        let in_classes = rewrite(&mut program.module, ctx, Traversal::PreOrder, |ctx, member: &ClassMember| {
            let ClassMember::TsIndexSignature(sig) = member else {
                return Ok(Rewrite::Keep);
            };
            if !placeholders.class_members.contains(&sig.span) {
                return Ok(Rewrite::Keep);
            }
            let template = if sig.readonly { CLASS_GETTER } else { CLASS_ACCESSORS };
            let Some(fragment) = lower_indexer(ctx, sig, &template)? else {
                return Ok(Rewrite::Expand(Vec::new()));
            };
            let Fragment::ClassMembers(mut members) = fragment else {
                return Err(unexpected_shape());
            };
            if sig.is_static {
                for member in &mut members {
                    if let ClassMember::Method(method) = member {
                        method.is_static = true;
                    }
                }
            }
            Ok(Rewrite::Expand(members))
        })?;

        let in_interfaces = rewrite(&mut program.module, ctx, Traversal::PreOrder, |ctx, element: &TsTypeElement| {
            let TsTypeElement::TsIndexSignature(sig) = element else {
                return Ok(Rewrite::Keep);
            };
            if !placeholders.type_elements.contains(&sig.span) {
                return Ok(Rewrite::Keep);
            }
            let template = if sig.readonly { INTERFACE_GETTER } else { INTERFACE_ACCESSORS };
            match lower_indexer(ctx, sig, &template)? {
                Some(Fragment::TypeElements(elements)) => Ok(Rewrite::Expand(elements)),
                Some(_) => Err(unexpected_shape()),
                None => Ok(Rewrite::Expand(Vec::new())),
            }
        })?;

        Ok(PassOutcome::from_changed(in_classes || in_interfaces))
    }

    fn postcondition(&self) -> Option<Postcondition> {
        Some(no_placeholders_remain)
    }
}

fn no_placeholders_remain(_: &LoweringContext, program: &Program) -> bool {
    Placeholders::collect(&program.module).is_empty()
}

fn unexpected_shape() -> PassError {
    PassError::Internal {
        pass: NAME,
        reason: "accessor template produced the wrong kind of fragment".into(),
    }
}

fn number_type() -> Box<TsType> {
    Box::new(TsType::TsKeywordType(TsKeywordType {
        span: swc_common::DUMMY_SP,
        kind: TsKeywordTypeKind::TsNumberKeyword,
    }))
}

/// Synthesize the accessors for `sig`, or `None` when it is dropped.
fn lower_indexer(
    ctx: &mut LoweringContext,
    sig: &TsIndexSignature,
    template: &Template,
) -> Result<Option<Fragment>, PassError> {
    let element = sig
        .type_ann
        .as_ref()
        .and_then(|ann| ctx.resolve_type(&ann.type_ann).concrete());
    let Some(element) = element else {
        tracing::debug!(span = ?sig.span, "dropping ambient indexer with an unrecoverable element type");
        return Ok(None);
    };

    let declared_key = sig.params.first().and_then(|param| match param {
        TsFnParam::Ident(binding) => binding.type_ann.as_ref(),
        _ => None,
    });
    let key = declared_key
        .and_then(|ann| ctx.resolve_type(&ann.type_ann).concrete())
        .unwrap_or_else(number_type);

    let scope = ctx.current_scope();
    ctx.synthesize(template, &[Subst::Type(key), Subst::Type(element)], scope)
        .map(Some)
}

/// Ambient bodies declaring more than one indexer, with their counts.
pub fn crowded_bodies(module: &Module) -> Vec<(Span, usize)> {
    Placeholders::collect(module).crowded
}

/// Index signatures that act as ambient indexers, by span.
#[derive(Default)]
struct Placeholders {
    /// Inside a `declare` namespace or module.
    ambient: bool,
    class_members: FxHashSet<Span>,
    type_elements: FxHashSet<Span>,
    /// Bodies holding more than one, with their counts.
    crowded: Vec<(Span, usize)>,
}

impl Placeholders {
    fn collect(module: &Module) -> Self {
        let mut placeholders = Self::default();
        module.visit_with(&mut placeholders);
        placeholders
    }

    fn is_empty(&self) -> bool {
        self.class_members.is_empty() && self.type_elements.is_empty()
    }

    fn note_crowding(&mut self, body: Span, count: usize) {
        if count > 1 {
            self.crowded.push((body, count));
        }
    }
}

impl Visit for Placeholders {
    fn visit_ts_module_decl(&mut self, n: &TsModuleDecl) {
        let saved = self.ambient;
        self.ambient |= n.declare;
        n.visit_children_with(self);
        self.ambient = saved;
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        if self.ambient || n.declare {
            let mut count = 0;
            for member in &n.class.body {
                if let ClassMember::TsIndexSignature(sig) = member {
                    self.class_members.insert(sig.span);
                    count += 1;
                }
            }
            self.note_crowding(n.class.span, count);
        }
        n.visit_children_with(self);
    }

    fn visit_ts_interface_decl(&mut self, n: &TsInterfaceDecl) {
        if self.ambient || n.declare {
            let mut count = 0;
            for element in &n.body.body {
                if let TsTypeElement::TsIndexSignature(sig) = element {
                    self.type_elements.insert(sig.span);
                    count += 1;
                }
            }
            self.note_crowding(n.body.span, count);
        }
        n.visit_children_with(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::{lower_with, squash};
    use crate::pipeline::PipelineError;
    use swc_common::Spanned;

    fn method_names(class: &Class) -> Vec<String> {
        class
            .body
            .iter()
            .filter_map(|member| match member {
                ClassMember::Method(ClassMethod {
                    key: PropName::Ident(name),
                    ..
                }) => Some(name.sym.to_string()),
                _ => None,
            })
            .collect()
    }

    fn first_class(module: &Module) -> &Class {
        module
            .body
            .iter()
            .find_map(|item| match item {
                ModuleItem::Stmt(Stmt::Decl(Decl::Class(decl))) => Some(&*decl.class),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn ambient_class_indexer_becomes_accessors() {
        let lowered = lower_with(
            AmbientIndexerLowering,
            "declare class Vec {\n    length: number;\n    [index: number]: string;\n}\n",
        );
        assert_eq!(lowered.result.as_ref().unwrap().changed().count(), 1);

        let class = first_class(&lowered.program.module);
        assert_eq!(method_names(class), ["$_get", "$_set"]);
        for member in &class.body[1..] {
            let ClassMember::Method(method) = member else { unreachable!() };
            assert!(method.function.body.is_none());
            assert_eq!(lowered.ctx.produced_by(NodeKind::ClassMember, member.span()), Some(NAME));
        }
        assert_eq!(class.body[1].span(), class.body[2].span());

        let code = squash(&lowered.code());
        assert!(code.contains("$_set(index: number, value: string): void"), "{code}");
    }

    #[test]
    fn readonly_indexers_only_get_a_getter() {
        let lowered = lower_with(AmbientIndexerLowering, "declare class Ro { readonly [i: number]: boolean; }");
        lowered.result.unwrap();
        assert_eq!(method_names(first_class(&lowered.program.module)), ["$_get"]);
    }

    #[test]
    fn interface_key_falls_back_to_number() {
        let lowered = lower_with(AmbientIndexerLowering, "declare interface Table { [key: Missing]: string; }");
        lowered.result.as_ref().unwrap();
        let code = squash(&lowered.code());
        assert!(code.contains("$_get(index: number): string"), "{code}");
        assert!(!code.contains("Missing"), "{code}");
    }

    #[test]
    fn unrecoverable_element_type_drops_the_indexer() {
        let lowered = lower_with(AmbientIndexerLowering, "declare interface Bag { name: string; [key: string]: Unknown; }");
        lowered.result.unwrap();
        let ModuleItem::Stmt(Stmt::Decl(Decl::TsInterface(decl))) = &lowered.program.module.body[0] else {
            unreachable!()
        };
        assert_eq!(decl.body.body.len(), 1);
    }

    #[test]
    fn two_indexers_in_one_body_violate_the_precondition() {
        let lowered = lower_with(
            AmbientIndexerLowering,
            "declare class Both { [i: number]: string; [k: string]: string; }",
        );
        let err = lowered.result.unwrap_err();
        assert!(matches!(err, PipelineError::Pass(PassError::Precondition { pass: NAME, .. })));
    }

    #[test]
    fn namespace_members_are_ambient() {
        let lowered = lower_with(
            AmbientIndexerLowering,
            "declare namespace ns { interface Row { [i: number]: string; } class Grid { [i: number]: boolean; } }",
        );
        lowered.result.as_ref().unwrap();
        let code = squash(&lowered.code());
        assert!(code.contains("$_get(index: number): string"), "{code}");
        assert!(code.contains("$_set(index: number, value: boolean): void"), "{code}");
    }

    #[test]
    fn crowded_ambient_bodies_are_reported_by_position() {
        let src = "declare class Both { [i: number]: string; [k: string]: string; }\ninterface Dict { [k: string]: any; [i: number]: string; }";
        let parsed = tl_parser::parse_module(src, "pass.ts", &FrontendOptions::default()).unwrap();
        let crowded = crowded_bodies(&parsed.module);
        assert_eq!(crowded.len(), 1);
        assert_eq!(crowded[0].1, 2);
        assert_eq!(crowded[0].0, first_class(&parsed.module).span);
    }

    #[test]
    fn regular_classes_and_placeholder_free_trees_are_untouched() {
        let src = "class Dict { [k: string]: number; }\ninterface Table { [k: string]: any; [i: number]: string; }\nconst x = 1;\n";
        let before = tl_parser::parse_module(src, "pass.ts", &FrontendOptions::default()).unwrap();
        let lowered = lower_with(AmbientIndexerLowering, src);
        let report = lowered.result.unwrap();
        assert_eq!(report.passes, [(NAME, PassOutcome::Unchanged)]);
        assert_eq!(lowered.program.module, before.module);
    }
}
