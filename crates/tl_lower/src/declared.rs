//! A checker driven by the declarations written in the module.
//!
//! It knows the annotated types of bindings and the parameter lists of
//! functions and class constructors declared in the module, and resolves
//! types that name keywords, declared types or standard globals. Anything
//! else is unrecoverable.

use rustc_hash::{FxHashMap, FxHashSet};
use swc_common::{sync::Lrc, SourceMap, Span, Spanned};
use swc_ecma_visit::{Visit, VisitWith};
use tl_ast::*;
use tl_parser::{bind_fragment, parse_fragment, Fragment, FragmentKind};

use crate::checker::{ArityMode, CheckError, Checker, ResolvedType, RestParam, Signature};

/// Global type names every program can refer to.
const STANDARD_GLOBALS: &[&str] = &[
    "Array",
    "ReadonlyArray",
    "Boolean",
    "Date",
    "Error",
    "Function",
    "Map",
    "Number",
    "Object",
    "Partial",
    "Promise",
    "Readonly",
    "Record",
    "RegExp",
    "Set",
    "String",
    "Symbol",
    "WeakMap",
    "WeakSet",
];

pub struct DeclaredChecker {
    cm: Lrc<SourceMap>,
    /// Keyed by the span of the binding identifier.
    signatures: FxHashMap<Span, Signature>,
    methods: FxHashMap<MethodKey, Signature>,
    annotations: FxHashMap<Span, Box<TsType>>,
}

/// A class method: the class binding's span, `static`, and the name.
type MethodKey = (Span, bool, String);

impl DeclaredChecker {
    pub fn new(cm: Lrc<SourceMap>, module: &Module) -> Self {
        let mut collector = DeclCollector::default();
        module.visit_with(&mut collector);
        tracing::debug!(
            signatures = collector.signatures.len(),
            methods = collector.methods.len(),
            annotations = collector.annotations.len(),
            "collected declarations"
        );
        Self {
            cm,
            signatures: collector.signatures,
            methods: collector.methods,
            annotations: collector.annotations,
        }
    }

    /// A checker that knows no declarations.
    pub fn empty(cm: Lrc<SourceMap>) -> Self {
        Self {
            cm,
            signatures: FxHashMap::default(),
            methods: FxHashMap::default(),
            annotations: FxHashMap::default(),
        }
    }

    fn method_signature(&self, member: &MemberExpr, scopes: &ScopeTree, scope: ScopeId) -> Option<Signature> {
        let MemberProp::Ident(name) = &member.prop else {
            return None;
        };
        let (class, is_static) = self.receiver_class(&member.obj, scopes, scope)?;
        self.methods.get(&(class, is_static, name.sym.to_string())).cloned()
    }

    /// The class `obj` is an instance of, or the class itself for static
    /// calls.
    fn receiver_class(&self, obj: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Option<(Span, bool)> {
        match obj {
            Expr::Paren(paren) => self.receiver_class(&paren.expr, scopes, scope),
            Expr::New(new) => class_binding(&new.callee, scopes, scope).map(|class| (class, false)),
            _ => {
                if let Some(class) = class_binding(obj, scopes, scope) {
                    return Some((class, true));
                }
                let ty = self.type_of(obj, scopes, scope)?;
                let TsType::TsTypeRef(TsTypeRef {
                    type_name: TsEntityName::Ident(name),
                    ..
                }) = &*ty
                else {
                    return None;
                };
                class_binding(&Expr::Ident(name.clone()), scopes, scope).map(|class| (class, false))
            }
        }
    }

    fn declared_binding(&self, expr: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Option<Span> {
        match expr {
            Expr::Ident(ident) => scopes.lookup(scope, &ident.sym).map(|(_, v)| v.decl_span),
            Expr::Paren(paren) => self.declared_binding(&paren.expr, scopes, scope),
            _ => None,
        }
    }
}

impl Checker for DeclaredChecker {
    fn parse_fragment(&self, text: &str, kind: FragmentKind) -> Result<Fragment, CheckError> {
        Ok(parse_fragment(&self.cm, text, kind)?)
    }

    fn bind_and_check(
        &mut self,
        fragment: &Fragment,
        scopes: &mut ScopeTree,
        scope: ScopeId,
        arity: ArityMode,
        minted: &FxHashSet<String>,
    ) -> Result<(), CheckError> {
        bind_fragment(fragment, scopes, scope);

        let mut check = FragmentCheck {
            checker: self,
            scopes,
            scope,
            arity,
            minted,
            depth: 0,
            error: None,
        };
        match fragment {
            Fragment::Expr(expr) => expr.visit_with(&mut check),
            Fragment::ClassMembers(members) => members.visit_with(&mut check),
            Fragment::TypeElements(elements) => elements.visit_with(&mut check),
            Fragment::Items(items) => items.visit_with(&mut check),
        }
        match check.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn resolve_type(&self, ty: &TsType, scopes: &ScopeTree, scope: ScopeId) -> ResolvedType {
        if resolves(ty, scopes, scope) {
            ResolvedType::Concrete(Box::new(ty.clone()))
        } else {
            ResolvedType::Unrecoverable
        }
    }

    fn type_of(&self, expr: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Option<Box<TsType>> {
        match expr {
            Expr::TsAs(as_expr) => Some(as_expr.type_ann.clone()),
            Expr::TsTypeAssertion(assertion) => Some(assertion.type_ann.clone()),
            Expr::Paren(paren) => self.type_of(&paren.expr, scopes, scope),
            _ => {
                let span = self.declared_binding(expr, scopes, scope)?;
                self.annotations.get(&span).cloned()
            }
        }
    }

    fn call_signature(&self, callee: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Option<Signature> {
        if let Expr::Member(member) = callee {
            return self.method_signature(member, scopes, scope);
        }
        let span = self.declared_binding(callee, scopes, scope)?;
        self.signatures.get(&span).cloned()
    }
}

/// Declaring span of the class `expr` names.
fn class_binding(expr: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Option<Span> {
    let Expr::Ident(ident) = expr else {
        return None;
    };
    let (_, variable) = scopes.lookup(scope, &ident.sym)?;
    (variable.kind == VariableKind::Class).then_some(variable.decl_span)
}

fn resolves(ty: &TsType, scopes: &ScopeTree, scope: ScopeId) -> bool {
    match ty {
        TsType::TsKeywordType(_) | TsType::TsThisType(_) | TsType::TsLitType(_) => true,
        TsType::TsArrayType(array) => resolves(&array.elem_type, scopes, scope),
        TsType::TsParenthesizedType(paren) => resolves(&paren.type_ann, scopes, scope),
        TsType::TsTypeOperator(op) => resolves(&op.type_ann, scopes, scope),
        TsType::TsOptionalType(opt) => resolves(&opt.type_ann, scopes, scope),
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsUnionType(u)) => {
            u.types.iter().all(|t| resolves(t, scopes, scope))
        }
        TsType::TsUnionOrIntersectionType(TsUnionOrIntersectionType::TsIntersectionType(i)) => {
            i.types.iter().all(|t| resolves(t, scopes, scope))
        }
        TsType::TsTupleType(tuple) => tuple
            .elem_types
            .iter()
            .all(|e| resolves(&e.ty, scopes, scope)),
        TsType::TsFnOrConstructorType(_) | TsType::TsTypeLit(_) => true,
        TsType::TsTypeRef(reference) => {
            let TsEntityName::Ident(name) = &reference.type_name else {
                return false;
            };
            let known = scopes.lookup_type(scope, &name.sym).is_some()
                || STANDARD_GLOBALS.contains(&&*name.sym);
            known
                && reference
                    .type_params
                    .as_ref()
                    .map_or(true, |args| args.params.iter().all(|t| resolves(t, scopes, scope)))
        }
        _ => false,
    }
}

/// Element type of an array-shaped rest annotation.
pub(crate) fn array_element(ty: &TsType) -> Option<Box<TsType>> {
    match ty {
        TsType::TsArrayType(array) => Some(array.elem_type.clone()),
        TsType::TsParenthesizedType(paren) => array_element(&paren.type_ann),
        TsType::TsTypeOperator(op) if op.op == TsTypeOperatorOp::ReadOnly => array_element(&op.type_ann),
        TsType::TsTypeRef(TsTypeRef {
            type_name: TsEntityName::Ident(name),
            type_params: Some(args),
            ..
        }) if matches!(&*name.sym, "Array" | "ReadonlyArray") && args.params.len() == 1 => {
            Some(args.params[0].clone())
        }
        _ => None,
    }
}

fn class_type(class: &Ident) -> Box<TsType> {
    Box::new(TsType::TsTypeRef(TsTypeRef {
        span: class.span,
        type_name: TsEntityName::Ident(class.clone()),
        type_params: None,
    }))
}

fn any_type() -> Box<TsType> {
    Box::new(TsType::TsKeywordType(TsKeywordType {
        span: swc_common::DUMMY_SP,
        kind: TsKeywordTypeKind::TsAnyKeyword,
    }))
}

/// Shape of one parameter for signature building.
enum ParamShape<'a> {
    Required,
    Optional,
    Rest(Option<&'a TsType>),
    /// `this` parameters take no argument.
    This,
}

fn param_shape(pat: &Pat) -> ParamShape<'_> {
    match pat {
        Pat::Ident(binding) if &*binding.id.sym == "this" => ParamShape::This,
        Pat::Ident(binding) if binding.id.optional => ParamShape::Optional,
        Pat::Assign(_) => ParamShape::Optional,
        Pat::Rest(rest) => ParamShape::Rest(rest.type_ann.as_deref().map(|a| &*a.type_ann)),
        _ => ParamShape::Required,
    }
}

fn signature<'a>(params: impl IntoIterator<Item = ParamShape<'a>>) -> Signature {
    let mut signature = Signature {
        fixed_count: 0,
        required_count: 0,
        rest: None,
    };
    let mut required_prefix = true;
    for param in params {
        match param {
            ParamShape::This => {}
            ParamShape::Required => {
                signature.fixed_count += 1;
                if required_prefix {
                    signature.required_count += 1;
                }
            }
            ParamShape::Optional => {
                signature.fixed_count += 1;
                required_prefix = false;
            }
            ParamShape::Rest(annotation) => {
                let declared = match annotation {
                    Some(ty) => Box::new(ty.clone()),
                    None => Box::new(TsType::TsArrayType(TsArrayType {
                        span: swc_common::DUMMY_SP,
                        elem_type: any_type(),
                    })),
                };
                signature.rest = array_element(&declared).map(|element| RestParam { declared, element });
                break;
            }
        }
    }
    signature
}

#[derive(Default)]
struct DeclCollector {
    signatures: FxHashMap<Span, Signature>,
    methods: FxHashMap<MethodKey, Signature>,
    annotations: FxHashMap<Span, Box<TsType>>,
}

impl DeclCollector {
    fn annotate(&mut self, pat: &Pat) {
        match pat {
            Pat::Ident(binding) => {
                if let Some(ann) = &binding.type_ann {
                    self.annotations.insert(binding.id.span, ann.type_ann.clone());
                }
            }
            Pat::Assign(assign) => self.annotate(&assign.left),
            _ => {}
        }
    }

    fn function_signature(function: &Function) -> Signature {
        signature(function.params.iter().map(|p| param_shape(&p.pat)))
    }
}

impl Visit for DeclCollector {
    fn visit_fn_decl(&mut self, n: &FnDecl) {
        // With overloads the first declaration is the one in scope.
        self.signatures
            .entry(n.ident.span)
            .or_insert_with(|| Self::function_signature(&n.function));
        n.visit_children_with(self);
    }

    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        self.annotate(&n.name);
        // `const c = new C()` is a `C` without saying so.
        if let (Pat::Ident(binding), Some(init)) = (&n.name, &n.init) {
            if let (None, Expr::New(new)) = (&binding.type_ann, &**init) {
                if let Expr::Ident(class) = &*new.callee {
                    self.annotations.insert(binding.id.span, class_type(class));
                }
            }
        }
        if let (Pat::Ident(binding), Some(init)) = (&n.name, &n.init) {
            let signature = match &**init {
                Expr::Arrow(arrow) => Some(signature(arrow.params.iter().map(param_shape))),
                Expr::Fn(f) => Some(Self::function_signature(&f.function)),
                _ => None,
            };
            if let Some(signature) = signature {
                self.signatures.insert(binding.id.span, signature);
            }
        }
        n.visit_children_with(self);
    }

    fn visit_param(&mut self, n: &Param) {
        self.annotate(&n.pat);
        n.visit_children_with(self);
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        for param in &n.params {
            self.annotate(param);
        }
        n.visit_children_with(self);
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        let constructor = n.class.body.iter().find_map(|member| match member {
            ClassMember::Constructor(c) => Some(c),
            _ => None,
        });
        let signature = match constructor {
            Some(c) => signature(c.params.iter().map(|param| match param {
                ParamOrTsParamProp::Param(p) => param_shape(&p.pat),
                ParamOrTsParamProp::TsParamProp(_) => ParamShape::Required,
            })),
            None => Signature {
                fixed_count: 0,
                required_count: 0,
                rest: None,
            },
        };
        self.signatures.insert(n.ident.span, signature);
        for member in &n.class.body {
            let ClassMember::Method(method) = member else { continue };
            let PropName::Ident(name) = &method.key else { continue };
            if method.kind != MethodKind::Method {
                continue;
            }
            self.methods
                .entry((n.ident.span, method.is_static, name.sym.to_string()))
                .or_insert_with(|| Self::function_signature(&method.function));
        }
        n.visit_children_with(self);
    }
}

/// Whether `name` has the `__<hint><n>` shape of a minted name.
/// Checks a bound fragment: minted names must resolve and calls must
/// satisfy the arity of known signatures.
struct FragmentCheck<'a> {
    checker: &'a DeclaredChecker,
    scopes: &'a ScopeTree,
    scope: ScopeId,
    arity: ArityMode,
    minted: &'a FxHashSet<String>,
    /// Nesting of calls; the resizable-arity rule applies to the outermost.
    depth: usize,
    error: Option<CheckError>,
}

impl FragmentCheck<'_> {
    fn in_scope(&mut self, span: Span, f: impl FnOnce(&mut Self)) {
        let saved = self.scope;
        if let Some(scope) = self.scopes.scope_of(span) {
            self.scope = scope;
        }
        f(self);
        self.scope = saved;
    }

    fn check_call(&mut self, callee: &Expr, args: &[ExprOrSpread], span: Span) {
        let Some(signature) = self.checker.call_signature(callee, self.scopes, self.scope) else {
            return;
        };
        if args.iter().any(|arg| arg.spread.is_some()) {
            return;
        }
        let found = args.len();
        let expected = if self.depth == 0 && self.arity == ArityMode::Resizable {
            let expected = signature.fixed_count + 1;
            (found != expected).then_some(expected)
        } else if found < signature.required_count {
            Some(signature.required_count)
        } else {
            None
        };
        if let Some(expected) = expected {
            self.error.get_or_insert(CheckError::Arity { expected, found, span });
        }
    }
}

impl Visit for FragmentCheck<'_> {
    fn visit_ident(&mut self, n: &Ident) {
        // User names were bound by the front end already.
        if self.minted.contains(&*n.sym) && !self.scopes.is_bound_in_chain(self.scope, &n.sym) {
            self.error.get_or_insert(CheckError::Unbound {
                name: n.sym.to_string(),
                span: n.span,
            });
        }
    }

    fn visit_call_expr(&mut self, n: &CallExpr) {
        if let Callee::Expr(callee) = &n.callee {
            self.check_call(callee, &n.args, n.span);
        }
        self.depth += 1;
        n.visit_children_with(self);
        self.depth -= 1;
    }

    fn visit_new_expr(&mut self, n: &NewExpr) {
        self.check_call(&n.callee, n.args.as_deref().unwrap_or_default(), n.span);
        self.depth += 1;
        n.visit_children_with(self);
        self.depth -= 1;
    }

    fn visit_function(&mut self, n: &Function) {
        self.in_scope(n.span, |this| n.visit_children_with(this));
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.in_scope(n.span, |this| n.visit_children_with(this));
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.in_scope(n.span, |this| n.visit_children_with(this));
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.in_scope(n.span, |this| n.visit_children_with(this));
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        self.in_scope(n.span, |this| n.visit_children_with(this));
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        self.in_scope(n.span, |this| n.visit_children_with(this));
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        self.in_scope(n.span, |this| n.visit_children_with(this));
    }
}
