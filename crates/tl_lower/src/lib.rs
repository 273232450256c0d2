//! Lowering of surface syntax into the core AST vocabulary.
//!
//! A [`Pipeline`] runs an ordered list of [`LoweringPass`]es over a
//! [`Program`]. Passes rewrite the tree through the generic walker in
//! [`rewrite`] and build replacement code from [`Template`]s, which are
//! parsed, bound and checked through the injected [`Checker`] before they
//! are spliced in.
//!
//! Passes:
//! - `ambient-indexer-lowering`: `[index: K]: V` in ambient classes and
//!   interfaces becomes `$_get`/`$_set` members
//! - `rest-argument-lowering`: trailing call arguments are packed into the
//!   callee's rest array
//! - `default-export-binding`: `export default <expr>` binds a named const

pub mod checker;
pub mod context;
pub mod declared;
pub mod driver;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod program;
pub mod rewrite;
pub mod template;

pub use checker::{ArityMode, CheckError, Checker, ResolvedType, RestParam, Signature};
pub use context::{LoweringContext, ScopeGuard};
pub use declared::DeclaredChecker;
pub use driver::{emit_module, lower_module, Emitted, LowerDiagnostic, LowerError, LowerOutput};
pub use pass::{LoweringPass, PassError, PassOutcome, Postcondition};
pub use pipeline::{Pipeline, PipelineError, PipelineReport};
pub use program::Program;
pub use rewrite::{rewrite, Rewrite, Traversal};
pub use template::{Subst, Template, TemplateError};
