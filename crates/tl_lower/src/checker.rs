//! The checker boundary used during synthesis.
//!
//! Lowering never checks code itself. It asks a [`Checker`] to parse
//! templates, to bind and check freshly built fragments, and to answer
//! type and signature questions about the tree.

use rustc_hash::FxHashSet;
use swc_common::Span;
use tl_ast::{Expr, ScopeId, ScopeTree, TsType};
use tl_parser::{Fragment, FragmentError, FragmentKind};

/// How call arity is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArityMode {
    #[default]
    Fixed,
    /// Set while a call rebuilt around a packed rest argument is checked:
    /// the root call must pass exactly one argument past the fixed ones.
    Resizable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Concrete(Box<TsType>),
    /// The type cannot be resolved to anything the back end can use.
    Unrecoverable,
}

impl ResolvedType {
    pub fn concrete(self) -> Option<Box<TsType>> {
        match self {
            ResolvedType::Concrete(ty) => Some(ty),
            ResolvedType::Unrecoverable => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestParam {
    /// The annotated rest type, e.g. `number[]` or `Array<number>`.
    pub declared: Box<TsType>,
    pub element: Box<TsType>,
}

/// Parameter shape of a callable, as far as argument packing cares.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Parameters before the rest parameter, optional ones included.
    pub fixed_count: usize,
    /// Leading parameters without `?` or a default.
    pub required_count: usize,
    pub rest: Option<RestParam>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Fragment(#[from] FragmentError),
    #[error("`{name}` is not bound in synthesized code")]
    Unbound { name: String, span: Span },
    #[error("call expects {expected} arguments, found {found}")]
    Arity {
        expected: usize,
        found: usize,
        span: Span,
    },
}

pub trait Checker {
    fn parse_fragment(&self, text: &str, kind: FragmentKind) -> Result<Fragment, CheckError>;

    /// Bind `fragment` below `scope` and check it. Every name in `minted`
    /// that the fragment mentions must be bound once it is.
    fn bind_and_check(
        &mut self,
        fragment: &Fragment,
        scopes: &mut ScopeTree,
        scope: ScopeId,
        arity: ArityMode,
        minted: &FxHashSet<String>,
    ) -> Result<(), CheckError>;

    fn resolve_type(&self, ty: &TsType, scopes: &ScopeTree, scope: ScopeId) -> ResolvedType;

    /// Declared type of `expr`, when known.
    fn type_of(&self, expr: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Option<Box<TsType>>;

    /// Signature of the function or class `callee` refers to.
    fn call_signature(&self, callee: &Expr, scopes: &ScopeTree, scope: ScopeId) -> Option<Signature>;
}
