//! Text-level preprocessor for syntax the SWC parser does not accept.
//!
//! `import lazy { a, b } from "m"` is rewritten to
//! `import      { a, b } from "m" with { lazy: "true" }`. The keyword is
//! blanked rather than removed so byte offsets before the attribute stay
//! aligned with the user's source.

use tl_ast::FrontendOptions;

mod lazy_import;
mod util;

/// Preprocess a source string, rewriting custom syntax to standard TS.
pub fn preprocess(source: &str, options: &FrontendOptions) -> String {
    if options.lazy_imports {
        lazy_import::rewrite_lazy_imports(source)
    } else {
        source.to_string()
    }
}
