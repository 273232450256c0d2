//! The generic tree-rewrite walker.
//!
//! [`rewrite`] visits every node of one target kind and lets a callback
//! keep it or splice in replacements. Spliced nodes take over the source
//! range of the node they replace and are recorded as produced by the
//! running pass. The walker keeps `ctx.current_scope()` in step with the
//! lexical scope of the node being visited.

use std::marker::PhantomData;

use swc_common::{Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_visit::{VisitMut, VisitMutWith};
use tl_ast::{NodeKind, Respan};

use crate::{context::LoweringContext, pass::PassError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// Callback first; replacements are then descended into unless the
    /// callback asked to skip them.
    PreOrder,
    /// Children first; replacements are never descended into.
    PostOrder,
}

/// Decision of a rewrite callback for one node.
pub enum Rewrite<N> {
    Keep,
    Replace(N),
    /// Replace with any number of nodes. Only list slots (class members,
    /// type elements, module items) accept other than exactly one.
    Expand(Vec<N>),
    /// Replace, and do not descend into the replacement.
    ReplaceAndSkip(N),
}

/// A node kind the walker can rewrite.
pub trait RewriteTarget: Respan + Spanned + Sized {
    const KIND: NodeKind;

    #[doc(hidden)]
    fn drive<F>(module: &mut Module, rewriter: &mut Rewriter<'_, Self, F>)
    where
        F: FnMut(&mut LoweringContext, &Self) -> Result<Rewrite<Self>, PassError>;
}

/// Rewrite every `N` in `module`. Returns whether anything was replaced.
///
/// The first callback error stops the walk and is returned.
pub fn rewrite<N, F>(
    module: &mut Module,
    ctx: &mut LoweringContext,
    traversal: Traversal,
    callback: F,
) -> Result<bool, PassError>
where
    N: RewriteTarget,
    F: FnMut(&mut LoweringContext, &N) -> Result<Rewrite<N>, PassError>,
{
    let saved = ctx.current_scope();
    ctx.set_current_scope(ctx.scopes().root());

    let mut rewriter = Rewriter {
        ctx,
        traversal,
        callback,
        changed: false,
        error: None,
        _target: PhantomData,
    };
    N::drive(module, &mut rewriter);

    let Rewriter {
        ctx, changed, error, ..
    } = rewriter;
    ctx.set_current_scope(saved);
    match error {
        Some(err) => Err(err),
        None => Ok(changed),
    }
}

pub struct Rewriter<'c, N, F> {
    ctx: &'c mut LoweringContext,
    traversal: Traversal,
    callback: F,
    changed: bool,
    error: Option<PassError>,
    _target: PhantomData<fn(N)>,
}

enum Flow {
    Descend,
    Skip,
}

impl<N, F> Rewriter<'_, N, F>
where
    N: RewriteTarget,
    F: FnMut(&mut LoweringContext, &N) -> Result<Rewrite<N>, PassError>,
{
    fn fail(&mut self, err: PassError) {
        self.error.get_or_insert(err);
    }

    fn splice(&mut self, original: Span, mut node: N) -> N {
        let own = node.span();
        node.respan(original);
        self.ctx.scopes_mut().rekey(own, original);
        self.ctx.record_provenance(N::KIND, original);
        self.changed = true;
        node
    }

    fn apply_one(&mut self, slot: &mut N) -> Flow {
        let original = slot.span();
        match (self.callback)(self.ctx, &*slot) {
            Ok(Rewrite::Keep) => Flow::Descend,
            Ok(Rewrite::Replace(node)) => {
                *slot = self.splice(original, node);
                Flow::Descend
            }
            Ok(Rewrite::ReplaceAndSkip(node)) => {
                *slot = self.splice(original, node);
                Flow::Skip
            }
            Ok(Rewrite::Expand(nodes)) => match <[N; 1]>::try_from(nodes) {
                Ok([node]) => {
                    *slot = self.splice(original, node);
                    Flow::Descend
                }
                Err(nodes) => {
                    let pass = self.ctx.current_pass().unwrap_or("<none>");
                    self.fail(PassError::Internal {
                        pass,
                        reason: format!("expanded a single-node slot into {} nodes", nodes.len()),
                    });
                    Flow::Skip
                }
            },
            Err(err) => {
                self.fail(err);
                Flow::Skip
            }
        }
    }

    fn apply_list(&mut self, node: N) -> (Vec<N>, Flow) {
        let original = node.span();
        match (self.callback)(self.ctx, &node) {
            Ok(Rewrite::Keep) => (vec![node], Flow::Descend),
            Ok(Rewrite::Replace(new)) => (vec![self.splice(original, new)], Flow::Descend),
            Ok(Rewrite::ReplaceAndSkip(new)) => (vec![self.splice(original, new)], Flow::Skip),
            Ok(Rewrite::Expand(nodes)) => {
                self.changed = true;
                let nodes = nodes.into_iter().map(|new| self.splice(original, new)).collect();
                (nodes, Flow::Descend)
            }
            Err(err) => {
                self.fail(err);
                (vec![node], Flow::Skip)
            }
        }
    }

    /// Run `f` inside the scope owned by the node at `span`, if it owns one.
    fn in_scope(&mut self, span: Span, f: impl FnOnce(&mut Self)) {
        match self.ctx.scopes().scope_of(span) {
            Some(scope) => {
                let saved = self.ctx.current_scope();
                self.ctx.set_current_scope(scope);
                f(self);
                self.ctx.set_current_scope(saved);
            }
            None => f(self),
        }
    }
}

macro_rules! scope_tracking {
    ($($method:ident: $node:ty),* $(,)?) => {
        $(
            fn $method(&mut self, n: &mut $node) {
                if self.error.is_some() {
                    return;
                }
                let span = n.span;
                self.in_scope(span, |this| n.visit_mut_children_with(this));
            }
        )*
    };
}

macro_rules! scoped_visitor {
    () => {
        scope_tracking!(
            visit_mut_function: Function,
            visit_mut_arrow_expr: ArrowExpr,
            visit_mut_constructor: Constructor,
            visit_mut_block_stmt: BlockStmt,
            visit_mut_for_stmt: ForStmt,
            visit_mut_for_in_stmt: ForInStmt,
            visit_mut_for_of_stmt: ForOfStmt,
            visit_mut_catch_clause: CatchClause,
        );
    };
}

impl<F> VisitMut for Rewriter<'_, Expr, F>
where
    F: FnMut(&mut LoweringContext, &Expr) -> Result<Rewrite<Expr>, PassError>,
{
    scoped_visitor!();

    fn visit_mut_expr(&mut self, expr: &mut Expr) {
        if self.error.is_some() {
            return;
        }
        match self.traversal {
            Traversal::PreOrder => {
                if let Flow::Descend = self.apply_one(expr) {
                    expr.visit_mut_children_with(self);
                }
            }
            Traversal::PostOrder => {
                expr.visit_mut_children_with(self);
                if self.error.is_none() {
                    self.apply_one(expr);
                }
            }
        }
    }
}

impl RewriteTarget for Expr {
    const KIND: NodeKind = NodeKind::Expr;

    fn drive<F>(module: &mut Module, rewriter: &mut Rewriter<'_, Self, F>)
    where
        F: FnMut(&mut LoweringContext, &Self) -> Result<Rewrite<Self>, PassError>,
    {
        module.visit_mut_with(rewriter);
    }
}

macro_rules! list_target {
    ($node:ty, $kind:expr, $method:ident) => {
        impl<F> VisitMut for Rewriter<'_, $node, F>
        where
            F: FnMut(&mut LoweringContext, &$node) -> Result<Rewrite<$node>, PassError>,
        {
            scoped_visitor!();

            fn $method(&mut self, list: &mut Vec<$node>) {
                if self.error.is_some() {
                    return;
                }
                for mut node in std::mem::take(list) {
                    if self.error.is_some() {
                        list.push(node);
                        continue;
                    }
                    match self.traversal {
                        Traversal::PreOrder => {
                            let (nodes, flow) = self.apply_list(node);
                            for mut node in nodes {
                                if matches!(flow, Flow::Descend) && self.error.is_none() {
                                    node.visit_mut_children_with(self);
                                }
                                list.push(node);
                            }
                        }
                        Traversal::PostOrder => {
                            node.visit_mut_children_with(self);
                            if self.error.is_some() {
                                list.push(node);
                                continue;
                            }
                            let (nodes, _) = self.apply_list(node);
                            list.extend(nodes);
                        }
                    }
                }
            }
        }

        impl RewriteTarget for $node {
            const KIND: NodeKind = $kind;

            fn drive<F>(module: &mut Module, rewriter: &mut Rewriter<'_, Self, F>)
            where
                F: FnMut(&mut LoweringContext, &Self) -> Result<Rewrite<Self>, PassError>,
            {
                module.visit_mut_with(rewriter);
            }
        }
    };
}

list_target!(ClassMember, NodeKind::ClassMember, visit_mut_class_members);
list_target!(TsTypeElement, NodeKind::TypeElement, visit_mut_ts_type_elements);
list_target!(ModuleItem, NodeKind::ModuleItem, visit_mut_module_items);
