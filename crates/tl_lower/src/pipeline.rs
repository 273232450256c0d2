use rustc_hash::FxHashSet;
use tl_ast::FrontendOptions;

use crate::{
    context::LoweringContext,
    pass::{LoweringPass, PassError, PassOutcome},
    passes::{AmbientIndexerLowering, DefaultExportBinding, RestArgumentLowering},
    program::Program,
};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Pass(#[from] PassError),
    #[error("postcondition of `{pass}` does not hold after it ran")]
    Postcondition { pass: &'static str },
    #[error("pass `{0}` is registered twice")]
    DuplicatePass(&'static str),
}

/// Outcome of each pass, in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub passes: Vec<(&'static str, PassOutcome)>,
}

impl PipelineReport {
    pub fn changed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes
            .iter()
            .filter(|(_, outcome)| *outcome == PassOutcome::Changed)
            .map(|(name, _)| *name)
    }
}

/// An ordered list of lowering passes, each run exactly once.
pub struct Pipeline {
    passes: Vec<Box<dyn LoweringPass>>,
}

impl Pipeline {
    pub fn new(passes: Vec<Box<dyn LoweringPass>>) -> Result<Self, PipelineError> {
        let mut seen = FxHashSet::default();
        for pass in &passes {
            if !seen.insert(pass.name()) {
                return Err(PipelineError::DuplicatePass(pass.name()));
            }
        }
        Ok(Self { passes })
    }

    /// The standard passes enabled by `options`, in their fixed order.
    pub fn from_options(options: &FrontendOptions) -> Self {
        let mut passes: Vec<Box<dyn LoweringPass>> = Vec::new();
        if options.ambient_indexers {
            passes.push(Box::new(AmbientIndexerLowering));
        }
        if options.rest_arguments {
            passes.push(Box::new(RestArgumentLowering));
        }
        if options.default_export_binding {
            passes.push(Box::new(DefaultExportBinding));
        }
        Self { passes }
    }

    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|pass| pass.name())
    }

    /// Run every pass, then its postcondition.
    ///
    /// The first failure stops the pipeline; later passes never see a
    /// partially lowered tree.
    pub fn run(&self, ctx: &mut LoweringContext, program: &mut Program) -> Result<PipelineReport, PipelineError> {
        let mut report = PipelineReport::default();
        for pass in &self.passes {
            let name = pass.name();
            let _span = tracing::info_span!("lowering_pass", pass = name).entered();

            ctx.begin_pass(name);
            let outcome = pass.run(ctx, program);
            ctx.end_pass();
            let outcome = outcome?;

            if let Some(postcondition) = pass.postcondition() {
                if !postcondition(ctx, program) {
                    tracing::error!("postcondition failed");
                    return Err(PipelineError::Postcondition { pass: name });
                }
            }
            tracing::info!(?outcome, "pass finished");
            report.passes.push((name, outcome));
        }
        Ok(report)
    }
}
