//! # Stackplan
//!
//! Dependency-ordered lifecycle operations over remote infrastructure stacks.
//!
//! A set of stacks is turned into a [`Plan`] whose steps each wrap one
//! stack and one non-blocking run function. The scheduler drives the plan
//! in passes: every step whose prerequisites are complete runs on a bounded
//! worker pool, steps that report an in-flight remote operation are polled
//! again on the next pass, and a failure fails everything that waits on it.
//!
//! ## Core Concepts
//!
//! - **Stack**: One deployable unit, addressed remotely by its `fqn`
//! - **Step**: A stack plus its run function, status and prerequisites
//! - **DependencyGraph**: Which stacks must finish before which
//! - **Plan**: Steps plus edges; can be outlined (dry run) or executed
//! - **Action**: [`Destroy`] or [`Build`], producing a plan from a stack set
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stackplan::{Action, Destroy, LogReporter, PlanOptions, Stack};
//!
//! let stacks = vec![
//!     Arc::new(Stack::new("network", Some("prod"))),
//!     Arc::new(Stack::new("database", Some("prod"))),
//! ];
//!
//! let destroy = Destroy::new(provider, stacks, PlanOptions::default(), Arc::new(LogReporter));
//!
//! // Logs the order only
//! destroy.run(false)?;
//!
//! // Actually tears everything down, dependents first
//! let outcome = destroy.run(true)?;
//! ```
//!
//! ## Provider Traits
//!
//! Remote state is reached only through traits:
//!
//! - [`Provider`]: Lookup, status predicates and deletion
//! - [`BuildProvider`]: Creation and update, for the [`Build`] action
//! - [`Reporter`]: Receives log lines and status transitions
//!
//! The crate performs no I/O of its own.

pub mod actions;
pub mod context;
pub mod error;
mod executor;
pub mod graph;
pub mod plan;
pub mod provider;
pub mod step;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use actions::{Action, ActionOutcome, Build, Destroy, build_stack, destroy_stack};
pub use context::{LogReporter, RecordingReporter, Reporter, Results, RunContext};
pub use error::{Error, Result};
pub use graph::{DependencyGraph, build_dependencies, destroy_dependencies};
pub use plan::Plan;
pub use provider::{
    BuildProvider, Provider, REQUIRED_STACKS_DELIMITER, RemoteStack, join_required_stacks,
    parse_required_stacks,
};
pub use step::{RunFn, Step};
pub use types::{PlanOptions, PlanSummary, PollConfig, Stack, Status};
