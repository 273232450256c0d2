//! TypeScript AST for the linking and lowering stages.
//!
//! Re-exports the standard SWC AST and adds what the later stages share:
//! - the lexical scope tree produced after parsing ([`ScopeTree`])
//! - node-kind tags and span rewriting for spliced nodes ([`Respan`])
//! - reserved module binding names
//! - front-end feature flags ([`FrontendOptions`])

pub use swc_ecma_ast::*;

mod options;
mod respan;
pub mod scope;

pub use options::FrontendOptions;
pub use respan::{NodeKind, Respan};
pub use scope::{ModuleSlot, Scope, ScopeId, ScopeKind, ScopeTree, Variable, VariableKind};

/// Local name bound by `export default <expr>` and by anonymous default
/// function or class declarations.
pub const DEFAULT_LOCAL_NAME: &str = "*default*";

/// External name of a module's default export.
pub const DEFAULT_EXTERNAL_NAME: &str = "default";

/// Import attribute marking `import lazy { .. }` after preprocessing.
pub const LAZY_ATTRIBUTE_KEY: &str = "lazy";
pub const LAZY_ATTRIBUTE_VALUE: &str = "true";

/// Internal local name of the `n`-th `export * as ns from "m"` in a module.
///
/// The name cannot be written in source, so it never collides with a user
/// binding.
pub fn namespace_export_internal_name(n: u32) -> String {
    format!("=ens{n}")
}
