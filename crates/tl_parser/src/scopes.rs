//! Scope construction for parsed modules and spliced fragments.

use swc_common::{Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};
use tl_ast::{namespace_export_internal_name, ScopeId, ScopeKind, ScopeTree, VariableKind, DEFAULT_LOCAL_NAME};

use crate::fragment::Fragment;

/// Build the lexical scope tree of a module.
pub fn build_scopes(module: &Module) -> ScopeTree {
    let mut tree = ScopeTree::new(module.span);
    let root = tree.root();
    module.visit_with(&mut ScopeBuilder::new(&mut tree, root));
    tree
}

/// Bind a freshly parsed fragment as if it sat under `scope`.
///
/// Nodes that already own a scope keep it, so binding the same fragment
/// twice is harmless.
pub fn bind_fragment(fragment: &Fragment, tree: &mut ScopeTree, scope: ScopeId) {
    let mut builder = ScopeBuilder::new(tree, scope);
    match fragment {
        Fragment::Expr(expr) => expr.visit_with(&mut builder),
        Fragment::ClassMembers(members) => members.visit_with(&mut builder),
        Fragment::TypeElements(elements) => elements.visit_with(&mut builder),
        Fragment::Items(items) => items.visit_with(&mut builder),
    }
}

/// Visitor that declares bindings into a [`ScopeTree`].
pub struct ScopeBuilder<'t> {
    tree: &'t mut ScopeTree,
    current: ScopeId,
    /// `export * as ns from "m"` declarations seen so far.
    namespace_exports: u32,
}

impl<'t> ScopeBuilder<'t> {
    pub fn new(tree: &'t mut ScopeTree, current: ScopeId) -> Self {
        Self {
            tree,
            current,
            namespace_exports: 0,
        }
    }

    fn declare(&mut self, scope: ScopeId, name: &str, kind: VariableKind, span: Span) {
        if !self.tree.declare(scope, name, kind, span) {
            tracing::trace!(name, "duplicate declaration in scope; keeping the first");
        }
    }

    fn declare_ident(&mut self, ident: &Ident, kind: VariableKind) {
        self.declare(self.current, &ident.sym, kind, ident.span);
    }

    fn declare_pat(&mut self, scope: ScopeId, pat: &Pat, kind: VariableKind) {
        let mut idents = Vec::new();
        binding_idents(pat, &mut idents);
        for ident in idents {
            self.declare(scope, &ident.sym, kind, ident.span);
        }
    }

    /// Run `f` inside the scope owned by the node at `span`.
    fn within(&mut self, kind: ScopeKind, span: Span, f: impl FnOnce(&mut Self)) {
        let scope = self.tree.add_scope(self.current, kind, span);
        let saved = std::mem::replace(&mut self.current, scope);
        f(self);
        self.current = saved;
    }
}

/// Binding identifiers introduced by a pattern, in source order.
pub fn binding_idents<'a>(pat: &'a Pat, out: &mut Vec<&'a Ident>) {
    match pat {
        Pat::Ident(binding) => out.push(&binding.id),
        Pat::Array(array) => {
            for elem in array.elems.iter().flatten() {
                binding_idents(elem, out);
            }
        }
        Pat::Rest(rest) => binding_idents(&rest.arg, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    ObjectPatProp::KeyValue(kv) => binding_idents(&kv.value, out),
                    ObjectPatProp::Assign(assign) => out.push(&assign.key.id),
                    ObjectPatProp::Rest(rest) => binding_idents(&rest.arg, out),
                }
            }
        }
        Pat::Assign(assign) => binding_idents(&assign.left, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

impl Visit for ScopeBuilder<'_> {
    fn visit_import_decl(&mut self, n: &ImportDecl) {
        for specifier in &n.specifiers {
            let local = match specifier {
                ImportSpecifier::Named(s) => &s.local,
                ImportSpecifier::Default(s) => &s.local,
                ImportSpecifier::Namespace(s) => &s.local,
            };
            self.declare_ident(local, VariableKind::Import);
        }
    }

    fn visit_var_decl(&mut self, n: &VarDecl) {
        let (kind, scope) = match n.kind {
            VarDeclKind::Var => (VariableKind::Var, self.tree.function_scope(self.current)),
            VarDeclKind::Let => (VariableKind::Let, self.current),
            VarDeclKind::Const => (VariableKind::Const, self.current),
        };
        for declarator in &n.decls {
            self.declare_pat(scope, &declarator.name, kind);
            declarator.init.visit_with(self);
        }
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        self.declare_ident(&n.ident, VariableKind::Function);
        n.function.visit_with(self);
    }

    fn visit_fn_expr(&mut self, n: &FnExpr) {
        // A named function expression binds its name inside itself.
        self.within(ScopeKind::Function, n.function.span, |this| {
            if let Some(ident) = &n.ident {
                this.declare_ident(ident, VariableKind::Function);
            }
            n.function.visit_with(this);
        });
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        self.declare_ident(&n.ident, VariableKind::Class);
        n.class.visit_with(self);
    }

    fn visit_export_default_decl(&mut self, n: &ExportDefaultDecl) {
        match &n.decl {
            DefaultDecl::Fn(f) => match &f.ident {
                Some(ident) => {
                    self.declare_ident(ident, VariableKind::Function);
                    f.function.visit_with(self);
                }
                None => {
                    self.declare(self.current, DEFAULT_LOCAL_NAME, VariableKind::Function, n.span);
                    f.function.visit_with(self);
                }
            },
            DefaultDecl::Class(c) => {
                match &c.ident {
                    Some(ident) => self.declare_ident(ident, VariableKind::Class),
                    None => self.declare(self.current, DEFAULT_LOCAL_NAME, VariableKind::Class, n.span),
                }
                c.class.visit_with(self);
            }
            DefaultDecl::TsInterfaceDecl(decl) => decl.visit_with(self),
        }
    }

    fn visit_named_export(&mut self, n: &NamedExport) {
        if n.src.is_none() {
            return;
        }
        for specifier in &n.specifiers {
            if let ExportSpecifier::Namespace(s) = specifier {
                let internal = namespace_export_internal_name(self.namespace_exports);
                self.namespace_exports += 1;
                if !n.type_only {
                    self.declare(self.current, &internal, VariableKind::Const, s.span);
                }
            }
        }
    }

    fn visit_export_default_expr(&mut self, n: &ExportDefaultExpr) {
        self.declare(self.current, DEFAULT_LOCAL_NAME, VariableKind::Const, n.span);
        n.expr.visit_with(self);
    }

    fn visit_ts_interface_decl(&mut self, n: &TsInterfaceDecl) {
        self.declare_ident(&n.id, VariableKind::Interface);
        n.visit_children_with(self);
    }

    fn visit_ts_type_alias_decl(&mut self, n: &TsTypeAliasDecl) {
        self.declare_ident(&n.id, VariableKind::TypeAlias);
        n.visit_children_with(self);
    }

    fn visit_ts_enum_decl(&mut self, n: &TsEnumDecl) {
        self.declare_ident(&n.id, VariableKind::Enum);
    }

    fn visit_ts_type_param(&mut self, n: &TsTypeParam) {
        self.declare_ident(&n.name, VariableKind::TypeParam);
    }

    fn visit_function(&mut self, n: &Function) {
        self.within(ScopeKind::Function, n.span, |this| {
            n.decorators.visit_with(this);
            n.type_params.visit_with(this);
            for param in &n.params {
                this.declare_pat(this.current, &param.pat, VariableKind::Param);
                param.visit_with(this);
            }
            n.return_type.visit_with(this);
            // The body block shares the function scope.
            if let Some(body) = &n.body {
                body.stmts.visit_with(this);
            }
        });
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.within(ScopeKind::Function, n.span, |this| {
            n.type_params.visit_with(this);
            for param in &n.params {
                this.declare_pat(this.current, param, VariableKind::Param);
                param.visit_with(this);
            }
            n.return_type.visit_with(this);
            match &*n.body {
                BlockStmtOrExpr::BlockStmt(block) => block.stmts.visit_with(this),
                BlockStmtOrExpr::Expr(expr) => expr.visit_with(this),
                #[allow(unreachable_patterns)]
                _ => {}
            }
        });
    }

    fn visit_constructor(&mut self, n: &Constructor) {
        self.within(ScopeKind::Function, n.span, |this| {
            for param in &n.params {
                match param {
                    ParamOrTsParamProp::Param(p) => {
                        this.declare_pat(this.current, &p.pat, VariableKind::Param);
                    }
                    ParamOrTsParamProp::TsParamProp(prop) => match &prop.param {
                        TsParamPropParam::Ident(binding) => {
                            this.declare_ident(&binding.id, VariableKind::Param);
                        }
                        TsParamPropParam::Assign(assign) => {
                            this.declare_pat(this.current, &assign.left, VariableKind::Param);
                        }
                    },
                }
                param.visit_with(this);
            }
            if let Some(body) = &n.body {
                body.stmts.visit_with(this);
            }
        });
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.within(ScopeKind::Block, n.span, |this| n.stmts.visit_with(this));
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.within(ScopeKind::Block, n.span, |this| n.visit_children_with(this));
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        self.within(ScopeKind::Block, n.span, |this| {
            visit_for_head(this, &n.left);
            n.right.visit_with(this);
            n.body.visit_with(this);
        });
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        self.within(ScopeKind::Block, n.span, |this| {
            visit_for_head(this, &n.left);
            n.right.visit_with(this);
            n.body.visit_with(this);
        });
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        self.within(ScopeKind::Block, n.span, |this| {
            if let Some(param) = &n.param {
                this.declare_pat(this.current, param, VariableKind::Let);
            }
            n.body.visit_with(this);
        });
    }
}

fn visit_for_head(builder: &mut ScopeBuilder<'_>, head: &ForHead) {
    match head {
        ForHead::VarDecl(decl) => decl.visit_with(builder),
        ForHead::Pat(pat) => pat.visit_with(builder),
        other => tracing::trace!(span = ?other.span(), "unhandled for-head binding"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_module;
    use tl_ast::FrontendOptions;

    fn scopes(src: &str) -> (Module, ScopeTree) {
        let parsed = parse_module(src, "scopes.ts", &FrontendOptions::default()).unwrap();
        (parsed.module, parsed.scopes)
    }

    #[test]
    fn module_level_declarations() {
        let (_, tree) = scopes(
            "import { a } from \"m\";\nconst b = 1;\nfunction c() {}\nclass D {}\ninterface E {}\nexport default 42;",
        );
        let root = tree.root();
        assert_eq!(tree.find_local(root, "a").unwrap().kind, VariableKind::Import);
        assert_eq!(tree.find_local(root, "b").unwrap().kind, VariableKind::Const);
        assert_eq!(tree.find_local(root, "c").unwrap().kind, VariableKind::Function);
        assert_eq!(tree.find_local(root, "D").unwrap().kind, VariableKind::Class);
        assert!(tree.find_local(root, "E").is_none());
        assert!(tree.lookup_type(root, "E").is_some());
        assert!(tree.find_local(root, DEFAULT_LOCAL_NAME).is_some());
    }

    #[test]
    fn var_hoists_out_of_blocks() {
        let (module, tree) = scopes("function f(p) { if (p) { var v = 1; let l = 2; } }");
        let ModuleItem::Stmt(Stmt::Decl(Decl::Fn(f))) = &module.body[0] else {
            panic!("expected a function");
        };
        let func = tree.scope_of(f.function.span).unwrap();
        assert_eq!(tree.find_local(func, "p").unwrap().kind, VariableKind::Param);
        assert!(tree.find_local(func, "v").is_some());
        assert!(tree.find_local(func, "l").is_none());
    }

    #[test]
    fn destructured_parameters_are_bound() {
        let (module, tree) = scopes("const g = ({ a, b: [c] }, ...rest) => a;");
        let ModuleItem::Stmt(Stmt::Decl(Decl::Var(var))) = &module.body[0] else {
            panic!("expected a variable declaration");
        };
        let Some(init) = &var.decls[0].init else { panic!("expected an initializer") };
        let arrow = tree.scope_of(init.span()).unwrap();
        for name in ["a", "c", "rest"] {
            assert!(tree.find_local(arrow, name).is_some(), "{name} is unbound");
        }
    }

    #[test]
    fn anonymous_default_function_binds_default_local() {
        let (_, tree) = scopes("export default function () {}");
        let default = tree.find_local(tree.root(), DEFAULT_LOCAL_NAME).unwrap();
        assert_eq!(default.kind, VariableKind::Function);
    }

    #[test]
    fn namespace_reexports_bind_their_internal_names() {
        let (_, tree) = scopes("export * as a from \"m\";\nexport * as b from \"o\";");
        let root = tree.root();
        let first = tree.find_local(root, &namespace_export_internal_name(0)).unwrap();
        assert_eq!(first.kind, VariableKind::Const);
        assert!(tree.find_local(root, &namespace_export_internal_name(1)).is_some());
        assert!(tree.find_local(root, &namespace_export_internal_name(2)).is_none());
    }
}
