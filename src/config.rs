use crate::paths;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use stackplan::{PlanOptions, PollConfig, Stack};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Config Structures
// ============================================================================

/// Top-level stackctl.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackctlConfig {
    /// Prefix joined to every stack name to form its remote name
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub plan: PlanConfig,

    #[serde(default)]
    pub stacks: Vec<StackConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// State file for the local provider; defaults under the state dir
    #[serde(default)]
    pub state_file: Option<String>,

    /// Seconds a remote operation stays in progress
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            state_file: None,
            settle_secs: default_settle_secs(),
        }
    }
}

fn default_settle_secs() -> u64 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanConfig {
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    /// Polls before a submitted step is failed; 0 disables the limit
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            poll_interval_secs: default_poll_interval_secs(),
            backoff_factor: default_backoff_factor(),
            max_interval_secs: default_max_interval_secs(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_jobs() -> usize {
    4
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_backoff_factor() -> f64 {
    1.5
}

fn default_max_interval_secs() -> u64 {
    30
}

fn default_max_polls() -> u32 {
    360
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackConfig {
    pub name: String,

    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

// ============================================================================
// Loading
// ============================================================================

impl StackctlConfig {
    /// Resolve, read, parse and validate the config
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf)> {
        let path = paths::config_file(explicit)?;
        let config = Self::load_from(&path)?;
        Ok((config, path))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!(
            "Loaded {} stack(s) from {}",
            config.stacks.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for stack in &self.stacks {
            if stack.name.trim().is_empty() {
                bail!("stack names must not be empty");
            }
            if stack.name.contains(stackplan::REQUIRED_STACKS_DELIMITER) {
                bail!(
                    "stack name {:?} must not contain {:?}",
                    stack.name,
                    stackplan::REQUIRED_STACKS_DELIMITER
                );
            }
            if !seen.insert(stack.name.as_str()) {
                bail!("stack {:?} is defined more than once", stack.name);
            }
        }

        if self.plan.jobs == 0 {
            bail!("plan.jobs must be at least 1");
        }
        if self.plan.backoff_factor.is_nan() || self.plan.backoff_factor < 1.0 {
            bail!("plan.backoff_factor must be at least 1.0");
        }
        Ok(())
    }

    /// Stacks in config order, shared with plans
    pub fn stacks(&self) -> Vec<Arc<Stack>> {
        let namespace = self.namespace.as_deref().filter(|ns| !ns.is_empty());
        self.stacks
            .iter()
            .map(|s| {
                let mut stack = Stack::new(&s.name, namespace).with_requires(s.requires.iter().cloned());
                stack.parameters = s.parameters.clone();
                Arc::new(stack)
            })
            .collect()
    }

    pub fn plan_options(&self) -> PlanOptions {
        let plan = &self.plan;
        PlanOptions {
            jobs: plan.jobs,
            poll: PollConfig::new(
                Duration::from_secs(plan.poll_interval_secs),
                plan.backoff_factor,
                Duration::from_secs(plan.max_interval_secs),
            ),
            max_polls: (plan.max_polls > 0).then_some(plan.max_polls),
        }
    }

    pub fn state_file(&self) -> Result<PathBuf> {
        match &self.provider.state_file {
            Some(path) => Ok(paths::expand(path)),
            None => paths::default_state_file(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
