use crate::{checker::CheckError, context::LoweringContext, program::Program, template::TemplateError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Changed,
    /// Nothing to do.
    Unchanged,
}

impl PassOutcome {
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            PassOutcome::Changed
        } else {
            PassOutcome::Unchanged
        }
    }
}

/// Predicate over the lowered program; `false` means the pass is broken.
pub type Postcondition = fn(&LoweringContext, &Program) -> bool;

/// Failure of a pass. Always fatal to the pipeline: these point at a
/// defect in the compiler, not in the program being compiled.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("`{pass}`: precondition violated: {reason}")]
    Precondition { pass: &'static str, reason: String },
    #[error("`{pass}`: synthesized code failed to check")]
    Synthesis {
        pass: &'static str,
        #[source]
        source: CheckError,
    },
    #[error("`{pass}`: malformed template")]
    Template {
        pass: &'static str,
        #[source]
        source: TemplateError,
    },
    #[error("`{pass}`: {reason}")]
    Internal { pass: &'static str, reason: String },
}

impl PassError {
    pub fn pass(&self) -> &'static str {
        match self {
            PassError::Precondition { pass, .. }
            | PassError::Synthesis { pass, .. }
            | PassError::Template { pass, .. }
            | PassError::Internal { pass, .. } => pass,
        }
    }
}

/// A named, self-contained AST rewrite.
///
/// Passes keep no state between runs. The name is recorded as the
/// provenance of every node the pass splices in.
pub trait LoweringPass {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &mut LoweringContext, program: &mut Program) -> Result<PassOutcome, PassError>;

    fn postcondition(&self) -> Option<Postcondition> {
        None
    }
}
