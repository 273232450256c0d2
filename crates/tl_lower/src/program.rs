use tl_ast::Module;
use tl_module::ModuleRecord;

/// A module being lowered, together with its runtime module record.
///
/// Passes may edit both; the record must keep describing the tree.
#[derive(Debug)]
pub struct Program {
    pub module: Module,
    pub record: ModuleRecord,
}

impl Program {
    pub fn new(module: Module, record: ModuleRecord) -> Self {
        Self { module, record }
    }
}
