//! The standard lowering passes.

mod ambient_indexer;
mod default_export;
mod rest_args;

pub use ambient_indexer::{crowded_bodies, AmbientIndexerLowering};
pub use default_export::DefaultExportBinding;
pub use rest_args::RestArgumentLowering;

#[cfg(test)]
pub(crate) mod testing {
    use swc_common::{sync::Lrc, SourceMap};
    use tl_ast::FrontendOptions;

    use crate::{
        context::LoweringContext,
        declared::DeclaredChecker,
        driver::emit_module,
        pass::LoweringPass,
        pipeline::{Pipeline, PipelineError, PipelineReport},
        program::Program,
    };

    pub struct Lowered {
        pub ctx: LoweringContext,
        pub program: Program,
        pub source_map: Lrc<SourceMap>,
        pub result: Result<PipelineReport, PipelineError>,
    }

    impl Lowered {
        pub fn code(&self) -> String {
            emit_module(&self.program.module, &self.source_map, false).unwrap().code
        }
    }

    /// Parse and link `src`, then run `pass` alone through a pipeline.
    pub fn lower_with(pass: impl LoweringPass + 'static, src: &str) -> Lowered {
        let parsed = tl_parser::parse_module(src, "pass.ts", &FrontendOptions::default()).unwrap();
        let linked = tl_module::link_module(&parsed.module);
        assert!(linked.diagnostics.is_empty(), "{:?}", linked.diagnostics);
        let checker = DeclaredChecker::new(parsed.source_map.clone(), &parsed.module);
        let mut ctx = LoweringContext::new(parsed.scopes, Box::new(checker));
        let mut program = Program::new(parsed.module, linked.record);
        let result = Pipeline::new(vec![Box::new(pass)])
            .and_then(|pipeline| pipeline.run(&mut ctx, &mut program));
        Lowered {
            ctx,
            program,
            source_map: parsed.source_map,
            result,
        }
    }

    /// Collapse whitespace so emitted code can be compared line-free.
    pub fn squash(code: &str) -> String {
        code.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
