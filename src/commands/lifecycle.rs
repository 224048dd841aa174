use anyhow::{Context as _, Result};
use stackplan::{Action, ActionOutcome, Build, Destroy, Error as PlanError};
use std::sync::Arc;

use crate::Context;
use crate::cli::LifecycleArgs;
use crate::config::StackctlConfig;
use crate::progress::ProgressReporter;
use crate::provider;
use crate::ui;

/// Which direction to walk the dependency graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Build,
    Destroy,
}

impl Lifecycle {
    fn title(self) -> &'static str {
        match self {
            Self::Build => "Build Stacks",
            Self::Destroy => "Destroy Stacks",
        }
    }
}

pub fn run(ctx: &Context, lifecycle: Lifecycle, args: &LifecycleArgs) -> Result<()> {
    let (config, path) = StackctlConfig::load(ctx.config.as_deref())?;
    let outcome = execute(ctx, &config, lifecycle, args)
        .with_context(|| format!("{} failed for {}", lifecycle.title(), path.display()))?;

    match outcome {
        Some(ActionOutcome::Outlined { .. }) => {
            if !ctx.quiet {
                ui::dim("Dry run - no changes were made");
            }
        }
        Some(ActionOutcome::Executed { summary, .. }) => {
            ui::success(&ui::plan_summary(&summary));
        }
        None => {}
    }
    Ok(())
}

/// Build the action for `lifecycle` and run it
///
/// Returns `None` when there is nothing configured to act on.
pub fn execute(
    ctx: &Context,
    config: &StackctlConfig,
    lifecycle: Lifecycle,
    args: &LifecycleArgs,
) -> Result<Option<ActionOutcome>> {
    let stacks = config.stacks();
    if stacks.is_empty() {
        ui::warn("No stacks configured");
        return Ok(None);
    }

    if !ctx.quiet {
        ui::header(lifecycle.title());
        if let Some(ns) = &config.namespace {
            ui::kv("Namespace", ns);
        }
        ui::kv("Stacks", &stacks.len().to_string());
        println!();
    }

    let mut options = config.plan_options();
    if let Some(jobs) = args.jobs {
        options.jobs = jobs.max(1);
    }

    let provider = provider::from_config(config)?;
    let reporter = Arc::new(ProgressReporter::new(stacks.len(), ctx.quiet || !args.force));

    let action: Box<dyn Action> = match lifecycle {
        Lifecycle::Build => Box::new(Build::new(provider, stacks, options, reporter.clone())),
        Lifecycle::Destroy => Box::new(Destroy::new(provider, stacks, options, reporter.clone())),
    };

    let result = action.run(args.force);
    reporter.finish();

    match result {
        Ok(outcome) => Ok(Some(outcome)),
        Err(PlanError::StepsFailed { failed }) => {
            ui::error(&format!("{} stack(s) failed", failed.len()));
            for name in &failed {
                ui::dim(name);
            }
            Err(PlanError::StepsFailed { failed }.into())
        }
        Err(err) if err.is_configuration() => {
            Err(anyhow::Error::new(err).context("Invalid stack dependencies"))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlanConfig, ProviderConfig, StackConfig};
    use crate::provider::LocalProvider;
    use stackplan::Provider;
    use tempfile::TempDir;

    fn ctx() -> Context {
        Context {
            verbose: 0,
            quiet: true,
            config: None,
        }
    }

    fn stack(name: &str, requires: &[&str]) -> StackConfig {
        StackConfig {
            name: name.to_string(),
            requires: requires.iter().map(ToString::to_string).collect(),
            parameters: Default::default(),
        }
    }

    fn config(dir: &TempDir) -> StackctlConfig {
        StackctlConfig {
            namespace: Some("test".to_string()),
            provider: ProviderConfig {
                state_file: Some(dir.path().join("state.json").display().to_string()),
                settle_secs: 0,
                ..Default::default()
            },
            plan: PlanConfig {
                poll_interval_secs: 0,
                max_interval_secs: 0,
                ..Default::default()
            },
            stacks: vec![stack("app", &["net"]), stack("net", &[])],
        }
    }

    fn args(force: bool) -> LifecycleArgs {
        LifecycleArgs { force, jobs: None }
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let outcome = execute(&ctx(), &config, Lifecycle::Build, &args(false))
            .unwrap()
            .unwrap();

        assert_eq!(outcome.order(), ["net", "app"]);
        assert!(outcome.summary().is_none());
        assert!(!dir.path().join("state.json").exists());
    }

    #[test]
    fn test_build_then_destroy() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let state = LocalProvider::new(dir.path().join("state.json"), 0);

        let built = execute(&ctx(), &config, Lifecycle::Build, &args(true))
            .unwrap()
            .unwrap();
        assert_eq!(built.summary().unwrap().complete, 2);
        assert!(state.get_stack("test-app").unwrap().is_some());

        let destroyed = execute(&ctx(), &config, Lifecycle::Destroy, &args(true))
            .unwrap()
            .unwrap();
        assert_eq!(destroyed.order(), ["app", "net"]);
        assert!(state.records().unwrap().is_empty());
    }

    #[test]
    fn test_no_stacks_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.stacks.clear();

        assert!(
            execute(&ctx(), &config, Lifecycle::Destroy, &args(true))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_unknown_requirement_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.stacks.push(stack("db", &["vault"]));

        let err = execute(&ctx(), &config, Lifecycle::Build, &args(true)).unwrap_err();
        assert!(err.to_string().contains("Invalid stack dependencies"));
    }
}
