//! TypeScript parser front for the linking and lowering stages.
//!
//! Wraps the standard SWC parser and adds:
//!
//! - text-level preprocessing of `import lazy { .. } from "m"`
//! - construction of the lexical scope tree for a parsed module
//! - parsing of template fragments used by lowering passes
//!
//! The preprocessor rewrites custom syntax at the text level before
//! passing to the standard SWC parser.

pub mod fragment;
pub mod parse;
pub mod preprocess;
pub mod scopes;

pub use fragment::{parse_fragment, Fragment, FragmentError, FragmentKind};
pub use parse::{parse_module, ParseResult};
pub use scopes::{bind_fragment, build_scopes, ScopeBuilder};
