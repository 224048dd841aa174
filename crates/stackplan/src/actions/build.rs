//! Build action - creates or updates stacks, requirements first

use super::Action;
use crate::context::{Reporter, RunContext};
use crate::error::Result;
use crate::graph;
use crate::plan::Plan;
use crate::provider::BuildProvider;
use crate::types::{PlanOptions, Stack, Status};
use anyhow::bail;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Brings every known stack up to date with its local definition
pub struct Build {
    provider: Arc<dyn BuildProvider>,
    stacks: Vec<Arc<Stack>>,
    options: PlanOptions,
    reporter: Arc<dyn Reporter>,
}

impl Build {
    pub fn new(
        provider: Arc<dyn BuildProvider>,
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
}

impl Action for Build {
    fn generate_plan(&self) -> Result<Plan> {
        let graph = graph::build_dependencies(&self.stacks);
        let mut plan = Plan::new("Build stacks", self.options.clone(), Arc::clone(&self.reporter));

        for stack in &self.stacks {
            let provider = Arc::clone(&self.provider);
            let requires = graph.get(&stack.name).cloned().unwrap_or_default();
            let issued = AtomicBool::new(false);
            plan.add(
                Arc::clone(stack),
                move |stack, ctx| build_stack(provider.as_ref(), stack, ctx, &issued),
                requires,
            )?;
        }

        // Surface unknown requirements and cycles before anything is touched
        plan.execution_order()?;
        Ok(plan)
    }
}

/// One polling transition of a stack's creation or update
///
/// `issued` is owned by the step and records whether this run started a
/// create or update. A stack that vanishes is only an error once it is set;
/// before that the stack may be finishing a delete started elsewhere.
pub fn build_stack(
    provider: &dyn BuildProvider,
    stack: &Stack,
    ctx: &RunContext<'_>,
    issued: &AtomicBool,
) -> anyhow::Result<Status> {
    let remote = match provider.get_stack(&stack.fqn)? {
        Some(remote) if !provider.is_stack_destroyed(&remote) => remote,
        _ => {
            if issued.load(Ordering::Acquire) {
                bail!("stack {} disappeared while being created", stack.fqn);
            }
            ctx.debug(&format!("Stack {} does not exist, creating.", stack.fqn));
            provider.create_stack(stack)?;
            issued.store(true, Ordering::Release);
            return Ok(Status::Submitted);
        }
    };

    let status = provider.get_stack_status(&remote);
    ctx.debug(&format!("Stack {} provider status: {}", remote.name, status));

    if provider.is_stack_failed(&remote) {
        bail!("stack {} is in state {}", remote.name, status);
    }
    if provider.is_stack_in_progress(&remote) {
        return Ok(Status::Submitted);
    }
    if !provider.is_stack_completed(&remote) {
        bail!("stack {} is in unexpected state {}", remote.name, status);
    }

    if ctx.is_resubmission() {
        return Ok(Status::Complete);
    }
    if provider.update_stack(stack, &remote)? {
        issued.store(true, Ordering::Release);
        Ok(Status::Submitted)
    } else {
        ctx.debug(&format!("Stack {} is up to date.", remote.name));
        Ok(Status::Skipped)
    }
}
