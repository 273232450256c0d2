use std::ops::{Deref, DerefMut};

use rustc_hash::{FxHashMap, FxHashSet};
use swc_common::{Span, DUMMY_SP};
use tl_ast::{Expr, Ident, NodeKind, ScopeId, ScopeTree, TsType};
use tl_parser::Fragment;

use crate::{
    checker::{ArityMode, CheckError, Checker, ResolvedType, Signature},
    pass::PassError,
    template::{self, Subst, Template},
};

/// State shared by the passes of one pipeline run.
///
/// Owns the scope tree of the module being lowered and the checker that
/// binds synthesized code into it.
pub struct LoweringContext {
    scopes: ScopeTree,
    checker: Box<dyn Checker>,
    current_scope: ScopeId,
    current_pass: Option<&'static str>,
    provenance: FxHashMap<(NodeKind, Span), &'static str>,
    next_gensym: u32,
    /// Every name [`LoweringContext::gensym`] has handed out.
    minted: FxHashSet<String>,
    arity: ArityMode,
}

impl LoweringContext {
    pub fn new(scopes: ScopeTree, checker: Box<dyn Checker>) -> Self {
        let current_scope = scopes.root();
        Self {
            scopes,
            checker,
            current_scope,
            current_pass: None,
            provenance: FxHashMap::default(),
            next_gensym: 0,
            minted: FxHashSet::default(),
            arity: ArityMode::Fixed,
        }
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeTree {
        &mut self.scopes
    }

    pub fn into_scopes(self) -> ScopeTree {
        self.scopes
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current_scope
    }

    pub(crate) fn set_current_scope(&mut self, scope: ScopeId) {
        self.current_scope = scope;
    }

    pub fn current_pass(&self) -> Option<&'static str> {
        self.current_pass
    }

    pub(crate) fn begin_pass(&mut self, name: &'static str) {
        debug_assert!(self.current_pass.is_none(), "pass `{name}` started inside another pass");
        self.current_pass = Some(name);
        self.current_scope = self.scopes.root();
    }

    pub(crate) fn end_pass(&mut self) {
        self.current_pass = None;
        self.current_scope = self.scopes.root();
    }

    /// Tag the node of `kind` at `span` as produced by the running pass.
    pub fn record_provenance(&mut self, kind: NodeKind, span: Span) {
        if let Some(pass) = self.current_pass {
            self.provenance.insert((kind, span), pass);
        }
    }

    /// Pass that produced the node of `kind` at `span`, if any.
    pub fn produced_by(&self, kind: NodeKind, span: Span) -> Option<&'static str> {
        self.provenance.get(&(kind, span)).copied()
    }

    /// Mint a fresh `__<hint><n>` name not bound anywhere on the current
    /// scope chain.
    ///
    /// The counter is shared by all passes, so names never repeat within a
    /// run. The name is bound once the declaration that uses it is bound.
    pub fn gensym(&mut self, hint: &str) -> Ident {
        loop {
            let name = format!("__{hint}{}", self.next_gensym);
            self.next_gensym += 1;
            if !self.scopes.is_bound_in_chain(self.current_scope, &name) {
                let ident = Ident::new_no_ctxt(name.as_str().into(), DUMMY_SP);
                self.minted.insert(name);
                return ident;
            }
            tracing::trace!(name, "gensym collides with a user binding");
        }
    }

    pub fn arity_mode(&self) -> ArityMode {
        self.arity
    }

    /// Run `f` with the resizable-arity marker set; it is cleared again
    /// before this returns.
    pub fn with_resizable_arity<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = std::mem::replace(&mut self.arity, ArityMode::Resizable);
        let result = f(self);
        self.arity = saved;
        result
    }

    /// Make `scope` current until the guard is dropped.
    pub fn enter_scope(&mut self, scope: ScopeId) -> ScopeGuard<'_> {
        let saved = std::mem::replace(&mut self.current_scope, scope);
        ScopeGuard { ctx: self, saved }
    }

    pub fn resolve_type(&self, ty: &TsType) -> ResolvedType {
        self.checker.resolve_type(ty, &self.scopes, self.current_scope)
    }

    pub fn type_of(&self, expr: &Expr) -> Option<Box<TsType>> {
        self.checker.type_of(expr, &self.scopes, self.current_scope)
    }

    pub fn call_signature(&self, callee: &Expr) -> Option<Signature> {
        self.checker.call_signature(callee, &self.scopes, self.current_scope)
    }

    /// Bind and check `fragment` as if it sat in `scope`.
    pub fn check(&mut self, fragment: &Fragment, scope: ScopeId) -> Result<(), CheckError> {
        let mut guard = self.enter_scope(scope);
        let ctx: &mut LoweringContext = &mut guard;
        ctx.checker
            .bind_and_check(fragment, &mut ctx.scopes, ctx.current_scope, ctx.arity, &ctx.minted)
    }

    /// Build a fragment from `template`, bound and checked in `scope`.
    pub fn synthesize(
        &mut self,
        template: &Template,
        subs: &[Subst],
        scope: ScopeId,
    ) -> Result<Fragment, PassError> {
        let pass = self.current_pass.unwrap_or("<none>");
        let mut fragment = self
            .checker
            .parse_fragment(template.text(), template.kind())
            .map_err(|source| PassError::Synthesis { pass, source })?;
        template::instantiate(&mut fragment, subs).map_err(|source| PassError::Template { pass, source })?;
        self.check(&fragment, scope)
            .map_err(|source| PassError::Synthesis { pass, source })?;
        Ok(fragment)
    }
}

/// Restores the previous current scope when dropped, on every exit path.
pub struct ScopeGuard<'c> {
    ctx: &'c mut LoweringContext,
    saved: ScopeId,
}

impl Deref for ScopeGuard<'_> {
    type Target = LoweringContext;

    fn deref(&self) -> &LoweringContext {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut LoweringContext {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.ctx.current_scope = self.saved;
    }
}
