//! Step state machine
//!
//! A step wraps one stack and the run function acting on it. Steps only
//! move forward: once terminal, a step keeps its status for the rest of
//! the plan.

use crate::context::RunContext;
use crate::types::{Stack, Status};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A single probe of a step's lifecycle operation
///
/// Returns the step's new status. Returning an error marks the step
/// failed; returning [`Status::Pending`] is a contract violation and is
/// treated the same way.
pub type RunFn = Box<dyn Fn(&Stack, &RunContext<'_>) -> anyhow::Result<Status> + Send + Sync>;

/// Outcome of one run-function invocation, as seen by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transition {
    pub status: Status,
    pub reason: Option<String>,
}

impl Transition {
    fn to(status: Status) -> Self {
        Self {
            status,
            reason: None,
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            reason: Some(reason.into()),
        }
    }
}

/// One stack's action within a plan
pub struct Step {
    stack: Arc<Stack>,
    status: Status,
    requires: BTreeSet<String>,
    run: RunFn,
    polls: u32,
    reason: Option<String>,
}

impl Step {
    pub(crate) fn new(stack: Arc<Stack>, run: RunFn, requires: BTreeSet<String>) -> Self {
        Self {
            stack,
            status: Status::Pending,
            requires,
            run,
            polls: 0,
            reason: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.stack.name
    }

    pub fn stack(&self) -> &Arc<Stack> {
        &self.stack
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Stacks whose steps must be terminal before this one runs
    pub fn requires(&self) -> &BTreeSet<String> {
        &self.requires
    }

    /// Consecutive invocations that returned SUBMITTED
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Why the step failed or was skipped, when known
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `status`; returns false if the step was already terminal
    pub(crate) fn set_status(&mut self, status: Status, reason: Option<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if status == Status::Submitted {
            self.polls += 1;
        } else {
            self.polls = 0;
        }
        self.status = status;
        self.reason = reason;
        true
    }

    /// Invoke the run function once, isolating errors and panics
    pub(crate) fn invoke(&self, ctx: &RunContext<'_>) -> Transition {
        let stack: &Stack = &self.stack;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.run)(stack, ctx)));

        match outcome {
            Ok(Ok(Status::Pending)) => Transition::failed("run function returned pending"),
            Ok(Ok(status)) => Transition::to(status),
            Ok(Err(e)) => Transition::failed(format!("{e:#}")),
            Err(payload) => Transition::failed(format!(
                "run function panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("stack", &self.stack.name)
            .field("status", &self.status)
            .field("requires", &self.requires)
            .field("polls", &self.polls)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
