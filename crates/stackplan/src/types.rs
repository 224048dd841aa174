//! Core types for plan execution

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

/// Status of a step within a plan
///
/// `Pending` and `Submitted` are in flight; the rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Not yet attempted
    Pending,
    /// An operation was initiated against the provider and is in flight
    Submitted,
    /// Terminal success
    Complete,
    /// Terminal, nothing needed doing
    Skipped,
    /// Terminal, unrecoverable
    Failed,
}

impl Status {
    /// Whether the status is final for the plan
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Skipped | Self::Failed)
    }

    /// Whether a step in this status unblocks the steps that require it
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Complete | Self::Skipped)
    }

    /// Position in the progress order (pending, in flight, done)
    pub fn progress(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Submitted => 1,
            Self::Complete | Self::Skipped | Self::Failed => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Complete => "complete",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One deployable unit of remote infrastructure
///
/// Stacks are built once per run from configuration and shared between
/// the steps that act on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// Short logical name, used as the graph node key
    pub name: String,
    /// Namespaced fully-qualified name used against the provider
    pub fqn: String,
    /// Stack parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    /// Locally declared requirements (creation direction)
    #[serde(default)]
    pub requires: BTreeSet<String>,
}

impl Stack {
    /// Create a stack, deriving the fqn from an optional namespace
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        let name = name.into();
        let fqn = match namespace {
            Some(ns) if !ns.is_empty() => format!("{ns}-{name}"),
            _ => name.clone(),
        };
        Self {
            name,
            fqn,
            parameters: BTreeMap::new(),
            requires: BTreeSet::new(),
        }
    }

    /// Set a locally declared requirement list
    pub fn with_requires<I, S>(mut self, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = requires.into_iter().map(Into::into).collect();
        self
    }

    /// Add a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Pacing between scheduling passes
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Delay after a pass that made progress
    pub interval: Duration,
    /// Multiplier applied for each consecutive pass without progress
    pub backoff_factor: f64,
    /// Upper bound on the delay
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            backoff_factor: 1.5,
            max_interval: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    /// Create a poll config with custom settings.
    pub fn new(interval: Duration, backoff_factor: f64, max_interval: Duration) -> Self {
        Self {
            interval,
            backoff_factor,
            max_interval,
        }
    }

    /// No pacing at all; passes run back to back
    pub fn immediate() -> Self {
        Self {
            interval: Duration::ZERO,
            backoff_factor: 1.0,
            max_interval: Duration::ZERO,
        }
    }

    /// Calculate the delay after `idle_passes` consecutive passes without progress.
    pub fn delay_for_attempt(&self, idle_passes: u32) -> Duration {
        let exponent = i32::try_from(idle_passes).unwrap_or(i32::MAX);
        let delay = self.interval.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_interval.as_secs_f64()).max(0.0);
        // The cap itself can round past Duration::MAX as f64
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_interval)
    }
}

/// Options for plan execution
#[derive(Debug, Clone)]
pub struct PlanOptions {
    /// Number of worker threads for steps eligible in the same pass
    pub jobs: usize,
    /// Pacing between passes
    pub poll: PollConfig,
    /// Fail a step after this many consecutive SUBMITTED results
    pub max_polls: Option<u32>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            poll: PollConfig::default(),
            max_polls: Some(360),
        }
    }
}

/// Summary of a finished plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub complete: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Number of scheduling passes the plan took
    pub passes: u32,
}

impl PlanSummary {
    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of steps accounted for
    pub fn total(&self) -> usize {
        self.complete + self.skipped + self.failed
    }

    /// Add a final step status to the summary
    pub fn add_status(&mut self, status: Status) {
        match status {
            Status::Complete => self.complete += 1,
            Status::Skipped => self.skipped += 1,
            Status::Failed => self.failed += 1,
            Status::Pending | Status::Submitted => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!Status::Pending.is_terminal());
        assert!(!Status::Submitted.is_terminal());
        assert!(Status::Complete.is_terminal());
        assert!(Status::Skipped.is_terminal());
        assert!(Status::Failed.is_terminal());
        assert!(!Status::Failed.is_satisfied());
        assert!(Status::Pending.progress() < Status::Submitted.progress());
        assert!(Status::Submitted.progress() < Status::Failed.progress());
    }

    #[test]
    fn test_stack_fqn() {
        assert_eq!(Stack::new("vpc", Some("acme")).fqn, "acme-vpc");
        assert_eq!(Stack::new("vpc", Some("")).fqn, "vpc");
        assert_eq!(Stack::new("vpc", None).fqn, "vpc");
    }

    #[test]
    fn test_poll_delay_backoff() {
        let poll = PollConfig::new(Duration::from_secs(2), 2.0, Duration::from_secs(10));

        assert_eq!(poll.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(poll.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(poll.delay_for_attempt(2), Duration::from_secs(8));
        assert_eq!(poll.delay_for_attempt(3), Duration::from_secs(10));
        assert_eq!(PollConfig::immediate().delay_for_attempt(5), Duration::ZERO);
    }

    #[test]
    fn test_poll_delay_with_huge_cap() {
        let poll = PollConfig::new(Duration::from_secs(5), 2.0, Duration::MAX);

        assert_eq!(poll.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(poll.delay_for_attempt(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = PlanSummary::default();
        summary.add_status(Status::Complete);
        summary.add_status(Status::Skipped);
        summary.add_status(Status::Submitted);
        assert_eq!(summary.total(), 2);
        assert!(summary.is_success());

        summary.add_status(Status::Failed);
        assert!(!summary.is_success());
    }
}
