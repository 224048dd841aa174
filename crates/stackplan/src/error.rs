//! Error types for plan construction and execution.
//!
//! Individual step failures are not errors: they are recorded as
//! [`Status::Failed`](crate::Status::Failed) on the step and surface only in
//! aggregate, as [`Error::StepsFailed`], once the whole plan has drained.

use thiserror::Error;

/// Errors that can occur while building or running a plan.
#[derive(Debug, Error)]
pub enum Error {
    /// The dependency relation contains a cycle
    #[error("cyclic dependency between stacks: {}", .stacks.join(", "))]
    CyclicDependency {
        /// Stacks that could not be ordered
        stacks: Vec<String>,
    },

    /// The same stack was registered twice in one plan
    #[error("stack {name} already has a step in this plan")]
    DuplicateStep {
        /// Name of the stack registered twice
        name: String,
    },

    /// A step requires a stack that has no step in the plan
    #[error("step {step} requires unknown stack {dependency}")]
    UnknownDependency {
        /// Step declaring the requirement
        step: String,
        /// The requirement with no matching step
        dependency: String,
    },

    /// One or more steps ended in the failed state
    #[error("{} step(s) failed: {}", .failed.len(), .failed.join(", "))]
    StepsFailed {
        /// Names of the failed steps, in execution order
        failed: Vec<String>,
    },

    /// The provider failed outside of a run function
    #[error("provider error: {0:#}")]
    Provider(#[source] anyhow::Error),

    /// The worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Whether this error reflects bad input (configuration) rather than a run failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::CyclicDependency { .. } | Self::DuplicateStep { .. } | Self::UnknownDependency { .. }
        )
    }
}

/// Result type for plan operations.
pub type Result<T> = std::result::Result<T, Error>;
