//! In-memory provider for tests
//!
//! Remote operations settle after a configurable number of reads, which
//! is enough to exercise the SUBMITTED → terminal polling path.

use crate::provider::{BuildProvider, Provider, RemoteStack, join_required_stacks};
use crate::types::Stack;
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

pub const CREATE_IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
pub const CREATE_COMPLETE: &str = "CREATE_COMPLETE";
pub const UPDATE_IN_PROGRESS: &str = "UPDATE_IN_PROGRESS";
pub const UPDATE_COMPLETE: &str = "UPDATE_COMPLETE";
pub const DELETE_IN_PROGRESS: &str = "DELETE_IN_PROGRESS";
pub const DELETE_COMPLETE: &str = "DELETE_COMPLETE";
pub const ROLLBACK_COMPLETE: &str = "ROLLBACK_COMPLETE";

#[derive(Debug, Clone)]
struct Record {
    remote: RemoteStack,
    parameters: BTreeMap<String, String>,
    /// Reads left before an in-flight operation settles
    settle_in: u32,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<String, Record>,
    calls: Vec<String>,
}

/// Provider backed by a map, with operations that settle after `lag` reads
#[derive(Debug, Default)]
pub struct MemoryProvider {
    state: Mutex<State>,
    lag: u32,
}

impl MemoryProvider {
    pub fn new(lag: u32) -> Self {
        Self {
            state: Mutex::default(),
            lag,
        }
    }

    /// Seed an existing remote stack
    pub fn with_stack(self, fqn: &str, status: &str, requires: &[&str]) -> Self {
        let mut remote = RemoteStack::new(fqn, status);
        if !requires.is_empty() {
            remote = remote.with_tag("required_stacks", requires.join(":"));
        }
        self.state.lock().unwrap().records.insert(
            fqn.to_string(),
            Record {
                remote,
                parameters: BTreeMap::new(),
                settle_in: 0,
            },
        );
        self
    }

    pub fn exists(&self, fqn: &str) -> bool {
        self.state.lock().unwrap().records.contains_key(fqn)
    }

    /// Every mutating call, as `"<op> <fqn>"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str, fqn: &str) -> usize {
        let call = format!("{op} {fqn}");
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn begin(&self, state: &mut State, op: &str, fqn: &str) {
        state.calls.push(format!("{op} {fqn}"));
        if let Some(record) = state.records.get_mut(fqn) {
            record.settle_in = self.lag;
        }
    }
}

impl Provider for MemoryProvider {
    fn get_stack(&self, fqn: &str) -> Result<Option<RemoteStack>> {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.records.get_mut(fqn) else {
            return Ok(None);
        };

        let in_flight = record.remote.status.ends_with("_IN_PROGRESS");
        if in_flight && record.settle_in > 0 {
            record.settle_in -= 1;
            return Ok(Some(record.remote.clone()));
        }

        if record.remote.status == DELETE_IN_PROGRESS {
            state.records.remove(fqn);
            return Ok(None);
        }
        if record.remote.status == CREATE_IN_PROGRESS {
            record.remote.status = CREATE_COMPLETE.to_string();
        } else if record.remote.status == UPDATE_IN_PROGRESS {
            record.remote.status = UPDATE_COMPLETE.to_string();
        }
        Ok(Some(record.remote.clone()))
    }

    fn get_required_stacks(&self, stack: &RemoteStack) -> Result<Option<String>> {
        Ok(stack.tags.get("required_stacks").cloned())
    }

    fn is_stack_destroyed(&self, stack: &RemoteStack) -> bool {
        stack.status == DELETE_COMPLETE
    }

    fn is_stack_in_progress(&self, stack: &RemoteStack) -> bool {
        stack.status.ends_with("_IN_PROGRESS")
    }

    fn destroy_stack(&self, stack: &RemoteStack) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.records.get_mut(&stack.name) {
            Some(record) => record.remote.status = DELETE_IN_PROGRESS.to_string(),
            None => anyhow::bail!("stack {} does not exist", stack.name),
        }
        self.begin(&mut state, "destroy", &stack.name);
        Ok(())
    }
}

impl BuildProvider for MemoryProvider {
    fn create_stack(&self, stack: &Stack) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut remote = RemoteStack::new(&stack.fqn, CREATE_IN_PROGRESS);
        if !stack.requires.is_empty() {
            remote = remote.with_tag("required_stacks", join_required_stacks(&stack.requires));
        }
        state.records.insert(
            stack.fqn.clone(),
            Record {
                remote,
                parameters: stack.parameters.clone(),
                settle_in: 0,
            },
        );
        self.begin(&mut state, "create", &stack.fqn);
        Ok(())
    }

    fn update_stack(&self, stack: &Stack, remote: &RemoteStack) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(record) = state.records.get_mut(&remote.name) else {
            anyhow::bail!("stack {} does not exist", remote.name);
        };
        if record.parameters == stack.parameters {
            return Ok(false);
        }
        record.parameters = stack.parameters.clone();
        record.remote.status = UPDATE_IN_PROGRESS.to_string();
        self.begin(&mut state, "update", &remote.name);
        Ok(true)
    }

    fn is_stack_completed(&self, stack: &RemoteStack) -> bool {
        matches!(stack.status.as_str(), CREATE_COMPLETE | UPDATE_COMPLETE)
    }

    fn is_stack_failed(&self, stack: &RemoteStack) -> bool {
        stack.status.ends_with("_FAILED") || stack.status == ROLLBACK_COMPLETE
    }
}
