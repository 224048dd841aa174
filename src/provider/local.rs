//! Local state-file provider
//!
//! Keeps "remote" stacks in a JSON file. Mutating operations leave a stack
//! `*_IN_PROGRESS` until its settle deadline passes; the first read after
//! the deadline finishes the operation. This gives the plan engine the same
//! submit-then-poll lifecycle a cloud provider would.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use stackplan::{BuildProvider, Provider, RemoteStack, Stack, join_required_stacks};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const CREATE_IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
pub const CREATE_COMPLETE: &str = "CREATE_COMPLETE";
pub const UPDATE_IN_PROGRESS: &str = "UPDATE_IN_PROGRESS";
pub const UPDATE_COMPLETE: &str = "UPDATE_COMPLETE";
pub const DELETE_IN_PROGRESS: &str = "DELETE_IN_PROGRESS";
pub const DELETE_COMPLETE: &str = "DELETE_COMPLETE";

/// Tag holding the `:`-joined requirement list
pub const REQUIRED_STACKS_TAG: &str = "required_stacks";

// ============================================================================
// State File
// ============================================================================

/// One stack as persisted in the state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackRecord {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
    /// When the in-flight operation finishes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settles_at: Option<DateTime<Utc>>,
}

impl StackRecord {
    fn to_remote(&self) -> RemoteStack {
        RemoteStack {
            name: self.name.clone(),
            status: self.status.clone(),
            tags: self.tags.clone(),
        }
    }

    fn is_in_progress(&self) -> bool {
        self.status.ends_with("_IN_PROGRESS")
    }

    fn begin(&mut self, status: &str, now: DateTime<Utc>, settle: TimeDelta) {
        self.status = status.to_string();
        self.updated_at = now;
        self.settles_at = Some(now.checked_add_signed(settle).unwrap_or(DateTime::<Utc>::MAX_UTC));
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    stacks: BTreeMap<String, StackRecord>,
}

// ============================================================================
// LocalProvider
// ============================================================================

/// Provider backed by a JSON file on disk
#[derive(Debug)]
pub struct LocalProvider {
    path: PathBuf,
    settle: TimeDelta,
    lock: Mutex<()>,
}

impl LocalProvider {
    pub fn new(path: impl Into<PathBuf>, settle_secs: u64) -> Self {
        Self {
            path: path.into(),
            settle: i64::try_from(settle_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .unwrap_or(TimeDelta::MAX),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded stacks, without settling anything
    pub fn records(&self) -> Result<Vec<StackRecord>> {
        let _guard = self.guard();
        Ok(self.load()?.stacks.into_values().collect())
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn load(&self) -> Result<StateFile> {
        if !self.path.exists() {
            log::debug!("State file does not exist, starting empty");
            return Ok(StateFile::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))
    }

    fn save(&self, state: &StateFile) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::trace!("Saved state to {}", self.path.display());
        Ok(())
    }

    /// Load, apply `f`, save
    fn modify<T>(&self, f: impl FnOnce(&mut StateFile, DateTime<Utc>) -> Result<T>) -> Result<T> {
        let _guard = self.guard();
        let mut state = self.load()?;
        let value = f(&mut state, Utc::now())?;
        self.save(&state)?;
        Ok(value)
    }
}

/// Finish an in-flight operation whose deadline has passed
///
/// Returns true if the record changed.
fn settle(state: &mut StateFile, fqn: &str, now: DateTime<Utc>) -> bool {
    let Some(record) = state.stacks.get_mut(fqn) else {
        return false;
    };
    if !record.is_in_progress() || record.settles_at.is_some_and(|at| at > now) {
        return false;
    }

    let finished = match record.status.as_str() {
        DELETE_IN_PROGRESS => None,
        CREATE_IN_PROGRESS => Some(CREATE_COMPLETE),
        UPDATE_IN_PROGRESS => Some(UPDATE_COMPLETE),
        _ => return false,
    };

    match finished {
        Some(status) => {
            record.status = status.to_string();
            record.updated_at = now;
            record.settles_at = None;
        }
        None => {
            state.stacks.remove(fqn);
        }
    }
    log::debug!("{fqn}: remote operation settled");
    true
}

fn requirement_tags(stack: &Stack) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    if !stack.requires.is_empty() {
        tags.insert(
            REQUIRED_STACKS_TAG.to_string(),
            join_required_stacks(&stack.requires),
        );
    }
    tags
}

impl Provider for LocalProvider {
    fn get_stack(&self, fqn: &str) -> Result<Option<RemoteStack>> {
        let _guard = self.guard();
        let mut state = self.load()?;

        if settle(&mut state, fqn, Utc::now()) {
            self.save(&state)?;
        }
        Ok(state.stacks.get(fqn).map(StackRecord::to_remote))
    }

    fn get_required_stacks(&self, stack: &RemoteStack) -> Result<Option<String>> {
        Ok(stack.tags.get(REQUIRED_STACKS_TAG).cloned())
    }

    fn is_stack_destroyed(&self, stack: &RemoteStack) -> bool {
        stack.status == DELETE_COMPLETE
    }

    fn is_stack_in_progress(&self, stack: &RemoteStack) -> bool {
        stack.status.ends_with("_IN_PROGRESS")
    }

    fn destroy_stack(&self, stack: &RemoteStack) -> Result<()> {
        let settle = self.settle;
        self.modify(|state, now| {
            let Some(record) = state.stacks.get_mut(&stack.name) else {
                bail!("stack {} does not exist", stack.name);
            };
            record.begin(DELETE_IN_PROGRESS, now, settle);
            log::info!("{}: delete started", stack.name);
            Ok(())
        })
    }
}

impl BuildProvider for LocalProvider {
    fn create_stack(&self, stack: &Stack) -> Result<()> {
        let settle = self.settle;
        self.modify(|state, now| {
            if state
                .stacks
                .get(&stack.fqn)
                .is_some_and(|r| r.status != DELETE_COMPLETE)
            {
                bail!("stack {} already exists", stack.fqn);
            }

            let mut record = StackRecord {
                name: stack.fqn.clone(),
                status: String::new(),
                tags: requirement_tags(stack),
                parameters: stack.parameters.clone(),
                updated_at: now,
                settles_at: None,
            };
            record.begin(CREATE_IN_PROGRESS, now, settle);
            state.stacks.insert(stack.fqn.clone(), record);
            log::info!("{}: create started", stack.fqn);
            Ok(())
        })
    }

    fn update_stack(&self, stack: &Stack, remote: &RemoteStack) -> Result<bool> {
        let settle = self.settle;
        self.modify(|state, now| {
            let Some(record) = state.stacks.get_mut(&remote.name) else {
                bail!("stack {} does not exist", remote.name);
            };

            let tags = requirement_tags(stack);
            if record.parameters == stack.parameters && record.tags == tags {
                return Ok(false);
            }

            record.parameters = stack.parameters.clone();
            record.tags = tags;
            record.begin(UPDATE_IN_PROGRESS, now, settle);
            log::info!("{}: update started", remote.name);
            Ok(true)
        })
    }

    fn is_stack_completed(&self, stack: &RemoteStack) -> bool {
        matches!(stack.status.as_str(), CREATE_COMPLETE | UPDATE_COMPLETE)
    }

    fn is_stack_failed(&self, stack: &RemoteStack) -> bool {
        stack.status.ends_with("_FAILED")
    }
}

// ============================================================================
// Tests
// ============================================================================
