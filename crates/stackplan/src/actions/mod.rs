//! Lifecycle actions built on top of plans
//!
//! An action turns the current stack set into a [`Plan`] whose run
//! functions each perform one non-blocking probe of a remote lifecycle
//! operation. Actions are dry-run by default: without `force` they only
//! outline the plan.

pub mod build;
pub mod destroy;

pub use build::{Build, build_stack};
pub use destroy::{Destroy, destroy_stack};

use crate::error::Result;
use crate::plan::Plan;
use crate::types::PlanSummary;
use log::Level;

/// What an action did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// Only the outline was produced
    Outlined { order: Vec<String> },
    /// The plan was executed to completion
    Executed {
        order: Vec<String>,
        summary: PlanSummary,
    },
}

impl ActionOutcome {
    /// Stack names in execution order
    pub fn order(&self) -> &[String] {
        match self {
            Self::Outlined { order } | Self::Executed { order, .. } => order,
        }
    }

    pub fn summary(&self) -> Option<&PlanSummary> {
        match self {
            Self::Outlined { .. } => None,
            Self::Executed { summary, .. } => Some(summary),
        }
    }
}

/// A lifecycle operation over a set of stacks
pub trait Action {
    /// Build a fresh plan for the current stack set
    fn generate_plan(&self) -> Result<Plan>;

    /// Outline the plan, or with `force`, execute it
    ///
    /// When executing, the order is still logged at debug level from a
    /// separate throwaway plan, since outlining marks every step complete.
    fn run(&self, force: bool) -> Result<ActionOutcome> {
        if !force {
            let mut plan = self.generate_plan()?;
            let order = plan.outline(Level::Info, true)?;
            return Ok(ActionOutcome::Outlined { order });
        }

        let mut debug_plan = self.generate_plan()?;
        let order = debug_plan.outline(Level::Debug, false)?;

        let mut plan = self.generate_plan()?;
        let summary = plan.execute()?;
        Ok(ActionOutcome::Executed { order, summary })
    }
}
