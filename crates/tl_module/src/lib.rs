//! Module linkage for a single source module.
//!
//! [`ModuleRecord`] is the canonical table of module requests, import
//! bindings and export bindings. [`link_module`] fills one from a parsed
//! module in source order and collects the user-facing diagnostics the
//! record's rejections imply.

mod linker;
mod record;

pub use linker::{link_module, LinkDiagnostic, LinkErrorKind, LinkOutput};
pub use record::{
    ExportEntry, ImportEntry, ModuleRecord, ModuleRequest, ModuleScope, ModuleSlots, ScopeView,
};
