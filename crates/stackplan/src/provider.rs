//! Provider traits for remote stack state
//!
//! A provider is the only thing in the engine that talks to the remote
//! side. Implementations are selected at construction and handed to
//! actions as `Arc<dyn Provider>`.

use crate::types::Stack;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Delimiter used when requirements cross the provider boundary as text
pub const REQUIRED_STACKS_DELIMITER: &str = ":";

/// Remote representation of a stack, as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStack {
    /// Remote name (the stack fqn)
    pub name: String,
    /// Provider-specific status token
    pub status: String,
    /// Provider-specific metadata
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl RemoteStack {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Operations the plan engine needs from a remote provider
///
/// # Example
///
/// ```ignore
/// use stackplan::{Provider, RemoteStack};
///
/// struct Static;
///
/// impl Provider for Static {
///     fn get_stack(&self, fqn: &str) -> anyhow::Result<Option<RemoteStack>> {
///         Ok(Some(RemoteStack::new(fqn, "CREATE_COMPLETE")))
///     }
///     // ...
/// }
/// ```
pub trait Provider: Send + Sync + fmt::Debug {
    /// Look up the remote counterpart of a stack; `None` when it does not exist
    fn get_stack(&self, fqn: &str) -> Result<Option<RemoteStack>>;

    /// The delimiter-separated list of stacks the remote stack requires
    fn get_required_stacks(&self, stack: &RemoteStack) -> Result<Option<String>>;

    /// Status token, for logging only
    fn get_stack_status(&self, stack: &RemoteStack) -> String {
        stack.status.clone()
    }

    /// Whether the remote stack is in a destroyed terminal state
    fn is_stack_destroyed(&self, stack: &RemoteStack) -> bool;

    /// Whether a remote operation is currently in flight
    fn is_stack_in_progress(&self, stack: &RemoteStack) -> bool;

    /// Initiate destruction; completion is observed later through `get_stack`
    fn destroy_stack(&self, stack: &RemoteStack) -> Result<()>;

    /// Required stacks as a set of names
    fn required_stacks(&self, stack: &RemoteStack) -> Result<BTreeSet<String>> {
        Ok(self
            .get_required_stacks(stack)?
            .map(|raw| parse_required_stacks(&raw))
            .unwrap_or_default())
    }
}

/// Create and update operations, for actions in the creation direction
pub trait BuildProvider: Provider {
    /// Initiate creation of a stack that does not exist remotely
    fn create_stack(&self, stack: &Stack) -> Result<()>;

    /// Initiate an update; returns `false` when there was nothing to change
    fn update_stack(&self, stack: &Stack, remote: &RemoteStack) -> Result<bool>;

    /// Whether the last create/update finished successfully
    fn is_stack_completed(&self, stack: &RemoteStack) -> bool;

    /// Whether the remote stack is in a failed state
    fn is_stack_failed(&self, stack: &RemoteStack) -> bool;
}

/// Parse a delimiter-separated requirement list into a set of names
pub fn parse_required_stacks(raw: &str) -> BTreeSet<String> {
    raw.split(REQUIRED_STACKS_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Join a requirement set into its delimited form
pub fn join_required_stacks<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    names
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(REQUIRED_STACKS_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_required_stacks() {
        let parsed = parse_required_stacks("vpc:bastion");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains("vpc"));
        assert!(parsed.contains("bastion"));

        assert!(parse_required_stacks("").is_empty());
        assert_eq!(parse_required_stacks(" vpc ::vpc:").len(), 1);
    }

    #[test]
    fn test_join_required_stacks() {
        let names: BTreeSet<String> = ["vpc".to_string(), "bastion".to_string()].into();
        assert_eq!(join_required_stacks(&names), "bastion:vpc");
    }
}
