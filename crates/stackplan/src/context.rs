//! Run context and reporting traits
//!
//! The engine never logs through a global; every plan is handed a
//! [`Reporter`] at construction and everything it says goes through it.

use crate::types::Status;
use log::Level;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Reporting capability injected into plans and actions
///
/// Implementations must be shareable across worker threads, since run
/// functions report from inside the pool.
pub trait Reporter: Send + Sync {
    /// Emit a message at the given level
    fn log(&self, level: Level, message: &str);

    /// Called at the start of each scheduling pass
    fn on_pass_start(&self, _pass: u32, _eligible: usize) {}

    /// Called whenever the scheduler assigns a status to a step
    fn on_step_status(&self, _name: &str, _status: Status, _reason: Option<&str>) {}
}

/// Reporter that forwards to the `log` facade
pub struct LogReporter;

impl Reporter for LogReporter {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "stackplan", level, "{message}");
    }

    fn on_step_status(&self, name: &str, status: Status, reason: Option<&str>) {
        match reason {
            Some(reason) => log::info!(target: "stackplan", "{name}: {status} ({reason})"),
            None => log::info!(target: "stackplan", "{name}: {status}"),
        }
    }
}

/// Reporter that keeps everything in memory
#[derive(Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<(Level, String)>>,
    transitions: Mutex<Vec<(String, Status)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded messages, in order
    pub fn lines(&self) -> Vec<(Level, String)> {
        match self.lines.lock() {
            Ok(locked) => locked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages recorded at exactly `level`
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    /// Every status assignment the scheduler reported, in order
    pub fn transitions(&self) -> Vec<(String, Status)> {
        match self.transitions.lock() {
            Ok(locked) => locked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Reporter for RecordingReporter {
    fn log(&self, level: Level, message: &str) {
        match self.lines.lock() {
            Ok(mut locked) => locked.push((level, message.to_string())),
            Err(poisoned) => poisoned.into_inner().push((level, message.to_string())),
        }
    }

    fn on_step_status(&self, name: &str, status: Status, _reason: Option<&str>) {
        let entry = (name.to_string(), status);
        match self.transitions.lock() {
            Ok(mut locked) => locked.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// Statuses accumulated by the scheduler, keyed by stack name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Results {
    statuses: BTreeMap<String, Status>,
}

impl Results {
    pub fn get(&self, name: &str) -> Option<Status> {
        self.statuses.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Status)> {
        self.statuses.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub(crate) fn record(&mut self, name: &str, status: Status) {
        self.statuses.insert(name.to_string(), status);
    }
}

/// Context passed to a run function
pub struct RunContext<'a> {
    /// Status of the step before this invocation
    pub status: Status,
    /// Scheduling pass number (1-based)
    pub pass: u32,
    /// Consecutive SUBMITTED results so far
    pub polls: u32,
    /// Snapshot of results taken at the start of the pass
    pub results: &'a Results,
    /// Reporter of the owning plan
    pub reporter: &'a dyn Reporter,
}

impl RunContext<'_> {
    /// Whether the previous invocation left an operation in flight
    pub fn is_resubmission(&self) -> bool {
        self.status == Status::Submitted
    }

    pub fn debug(&self, message: &str) {
        self.reporter.log(Level::Debug, message);
    }
}
