//! Destroy action - tears stacks down, dependents first

use super::Action;
use crate::context::{Reporter, RunContext};
use crate::error::Result;
use crate::graph::{self, DependencyGraph};
use crate::plan::Plan;
use crate::provider::Provider;
use crate::types::{PlanOptions, Stack, Status};
use log::Level;
use std::collections::HashMap;
use std::sync::Arc;

/// Destroys every known stack, waiting for dependents to go first
pub struct Destroy {
    provider: Arc<dyn Provider>,
    stacks: Vec<Arc<Stack>>,
    options: PlanOptions,
    reporter: Arc<dyn Reporter>,
}

impl Destroy {
    pub fn new(
        provider: Arc<dyn Provider>,
        stacks: Vec<Arc<Stack>>,
        options: PlanOptions,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            provider,
            stacks,
            options,
            reporter,
        }
    }

    /// Destroy-direction graph from what the provider reports right now
    pub fn dependencies(&self) -> Result<DependencyGraph> {
        graph::destroy_dependencies(&self.stacks, self.provider.as_ref())
    }
}

impl Action for Destroy {
    fn generate_plan(&self) -> Result<Plan> {
        let graph = self.dependencies()?;
        let by_name: HashMap<&str, &Arc<Stack>> =
            self.stacks.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut plan = Plan::new("Destroy stacks", self.options.clone(), Arc::clone(&self.reporter));

        for name in graph.execution_order()? {
            let Some(stack) = by_name.get(name.as_str()) else {
                self.reporter.log(
                    Level::Debug,
                    &format!("{name} is required remotely but not managed here, leaving it alone"),
                );
                continue;
            };

            let provider = Arc::clone(&self.provider);
            let requires = graph.get(&name).cloned().unwrap_or_default();
            plan.add(
                Arc::clone(stack),
                move |stack, ctx| destroy_stack(provider.as_ref(), stack, ctx),
                requires,
            )?;
        }

        Ok(plan)
    }
}

/// One polling transition of a stack's destruction
///
/// Safe to call repeatedly: the only side effect is initiating the delete
/// when it is neither done nor already in flight.
pub fn destroy_stack(provider: &dyn Provider, stack: &Stack, ctx: &RunContext<'_>) -> anyhow::Result<Status> {
    let Some(remote) = provider.get_stack(&stack.fqn)? else {
        ctx.debug(&format!("Stack {} does not exist.", stack.fqn));
        // Nonexistence after a submitted delete is the completion signal
        return Ok(if ctx.is_resubmission() {
            Status::Complete
        } else {
            Status::Skipped
        });
    };

    ctx.debug(&format!(
        "Stack {} provider status: {}",
        remote.name,
        provider.get_stack_status(&remote)
    ));

    if provider.is_stack_destroyed(&remote) {
        return Ok(Status::Complete);
    }
    if provider.is_stack_in_progress(&remote) {
        return Ok(Status::Submitted);
    }

    provider.destroy_stack(&remote)?;
    Ok(Status::Submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionOutcome;
    use crate::context::{RecordingReporter, Results};
    use crate::error::Error;
    use crate::testing::{self, MemoryProvider};
    use crate::types::PollConfig;

    fn options() -> PlanOptions {
        PlanOptions {
            jobs: 2,
            poll: PollConfig::immediate(),
            max_polls: Some(20),
        }
    }

    fn stacks(names: &[&str]) -> Vec<Arc<Stack>> {
        names
            .iter()
            .map(|n| Arc::new(Stack::new(*n, Some("acme"))))
            .collect()
    }

    /// base <- net <- app, all live remotely
    fn layered_provider(lag: u32) -> Arc<MemoryProvider> {
        Arc::new(
            MemoryProvider::new(lag)
                .with_stack("acme-base", testing::CREATE_COMPLETE, &[])
                .with_stack("acme-net", testing::CREATE_COMPLETE, &["base"])
                .with_stack("acme-app", testing::UPDATE_COMPLETE, &["net"]),
        )
    }

    fn destroy(provider: &Arc<MemoryProvider>, reporter: &Arc<RecordingReporter>) -> Destroy {
        Destroy::new(
            provider.clone(),
            stacks(&["base", "net", "app"]),
            options(),
            reporter.clone(),
        )
    }

    fn probe(provider: &MemoryProvider, stack: &Stack, status: Status) -> Status {
        let results = Results::default();
        let reporter = RecordingReporter::new();
        let ctx = RunContext {
            status,
            pass: 1,
            polls: 0,
            results: &results,
            reporter: &reporter,
        };
        destroy_stack(provider, stack, &ctx).unwrap()
    }

    #[test]
    fn test_missing_stack_is_skipped_unless_submitted() {
        let provider = MemoryProvider::new(0);
        let stack = Stack::new("gone", Some("acme"));

        for _ in 0..3 {
            assert_eq!(probe(&provider, &stack, Status::Pending), Status::Skipped);
        }
        assert_eq!(probe(&provider, &stack, Status::Submitted), Status::Complete);
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_destroyed_and_in_progress_stacks() {
        let provider = MemoryProvider::new(0)
            .with_stack("acme-old", testing::DELETE_COMPLETE, &[])
            .with_stack("acme-busy", testing::DELETE_IN_PROGRESS, &[]);

        let old = Stack::new("old", Some("acme"));
        assert_eq!(probe(&provider, &old, Status::Pending), Status::Complete);

        // Seeded records have already settled, so the first read finishes the delete
        let busy = Stack::new("busy", Some("acme"));
        assert_eq!(probe(&provider, &busy, Status::Pending), Status::Skipped);
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_in_flight_delete_is_not_resubmitted() {
        let provider = MemoryProvider::new(3).with_stack("acme-db", testing::CREATE_COMPLETE, &[]);
        let stack = Stack::new("db", Some("acme"));

        assert_eq!(probe(&provider, &stack, Status::Pending), Status::Submitted);
        assert_eq!(probe(&provider, &stack, Status::Submitted), Status::Submitted);
        assert_eq!(probe(&provider, &stack, Status::Submitted), Status::Submitted);
        assert_eq!(provider.count("destroy", "acme-db"), 1);
    }

    #[test]
    fn test_dependents_graph_and_order() {
        let provider = layered_provider(0);
        let reporter = Arc::new(RecordingReporter::new());
        let action = destroy(&provider, &reporter);

        let graph = action.dependencies().unwrap();
        assert!(graph.get("base").unwrap().contains("net"));
        assert!(graph.get("net").unwrap().contains("app"));
        assert_eq!(graph.execution_order().unwrap(), vec!["app", "net", "base"]);
    }

    #[test]
    fn test_dry_run_only_outlines() {
        let provider = layered_provider(0);
        let reporter = Arc::new(RecordingReporter::new());

        let outcome = destroy(&provider, &reporter).run(false).unwrap();

        assert_eq!(
            outcome,
            ActionOutcome::Outlined {
                order: vec!["app".into(), "net".into(), "base".into()]
            }
        );
        assert!(provider.calls().is_empty());
        assert!(provider.exists("acme-base"));

        let info = reporter.messages_at(Level::Info);
        assert_eq!(info[0], "Plan \"Destroy stacks\":");
        assert!(info[1].contains("\"app\""));
        assert!(info.last().unwrap().contains("--force"));
        assert!(reporter.transitions().is_empty());
    }

    #[test]
    fn test_force_logs_same_order_and_executes() {
        let dry_provider = layered_provider(0);
        let dry_reporter = Arc::new(RecordingReporter::new());
        destroy(&dry_provider, &dry_reporter).run(false).unwrap();

        let provider = layered_provider(0);
        let reporter = Arc::new(RecordingReporter::new());
        let outcome = destroy(&provider, &reporter).run(true).unwrap();

        let dry_steps: Vec<String> = dry_reporter
            .messages_at(Level::Info)
            .into_iter()
            .filter(|l| l.contains("step:"))
            .collect();
        let forced_steps: Vec<String> = reporter
            .messages_at(Level::Debug)
            .into_iter()
            .filter(|l| l.contains("step:"))
            .collect();
        assert_eq!(dry_steps, forced_steps);
        assert_eq!(outcome.order(), ["app", "net", "base"]);

        for fqn in ["acme-app", "acme-net", "acme-base"] {
            assert!(!provider.exists(fqn));
        }
    }

    #[test]
    fn test_end_to_end_two_passes_per_step() {
        let provider = layered_provider(0);
        let reporter = Arc::new(RecordingReporter::new());

        let outcome = destroy(&provider, &reporter).run(true).unwrap();
        let summary = outcome.summary().unwrap();

        assert_eq!(summary.complete, 3);
        assert_eq!(summary.passes, 6);
        assert_eq!(
            provider.calls(),
            vec!["destroy acme-app", "destroy acme-net", "destroy acme-base"]
        );
        assert_eq!(
            reporter.transitions(),
            vec![
                ("app".to_string(), Status::Submitted),
                ("app".to_string(), Status::Complete),
                ("net".to_string(), Status::Submitted),
                ("net".to_string(), Status::Complete),
                ("base".to_string(), Status::Submitted),
                ("base".to_string(), Status::Complete),
            ]
        );
    }

    #[test]
    fn test_slow_deletes_are_polled() {
        let provider = layered_provider(2);
        let reporter = Arc::new(RecordingReporter::new());

        let outcome = destroy(&provider, &reporter).run(true).unwrap();

        assert_eq!(outcome.summary().unwrap().complete, 3);
        assert_eq!(provider.count("destroy", "acme-net"), 1);
        assert!(!provider.exists("acme-base"));
    }

    #[test]
    fn test_stacks_never_created_are_skipped() {
        let provider = Arc::new(MemoryProvider::new(0).with_stack("acme-app", testing::CREATE_COMPLETE, &[]));
        let reporter = Arc::new(RecordingReporter::new());

        let outcome = destroy(&provider, &reporter).run(true).unwrap();
        let summary = outcome.summary().unwrap();

        assert_eq!(summary.complete, 1);
        assert_eq!(summary.skipped, 2);
    }

    #[test]
    fn test_external_requirement_is_not_a_step() {
        let provider = Arc::new(
            MemoryProvider::new(0).with_stack("acme-app", testing::CREATE_COMPLETE, &["shared-vpc"]),
        );
        let reporter = Arc::new(RecordingReporter::new());
        let action = Destroy::new(provider.clone(), stacks(&["app"]), options(), reporter.clone());

        let plan = action.generate_plan().unwrap();

        assert_eq!(plan.len(), 1);
        assert!(plan.step("shared-vpc").is_none());
        assert!(
            reporter
                .messages_at(Level::Debug)
                .iter()
                .any(|l| l.starts_with("shared-vpc"))
        );
    }

    #[test]
    fn test_cyclic_requirements_fail_plan_generation() {
        let provider = Arc::new(
            MemoryProvider::new(0)
                .with_stack("acme-a", testing::CREATE_COMPLETE, &["b"])
                .with_stack("acme-b", testing::CREATE_COMPLETE, &["a"]),
        );
        let reporter = Arc::new(RecordingReporter::new());
        let action = Destroy::new(provider.clone(), stacks(&["a", "b"]), options(), reporter);

        assert!(matches!(
            action.run(true),
            Err(Error::CyclicDependency { .. })
        ));
        assert!(provider.calls().is_empty());
    }
}
