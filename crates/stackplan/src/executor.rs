//! Execution engine - drives a plan's steps to terminal statuses
//!
//! Execution proceeds in passes. Each pass fails every step blocked behind
//! a failed prerequisite, runs every step whose prerequisites are complete
//! or skipped on a bounded worker pool, and records the statuses returned.
//! Steps left SUBMITTED are polled again on the next pass, after a pause.

use crate::context::{Results, RunContext};
use crate::error::{Error, Result};
use crate::plan::Plan;
use crate::step::Transition;
use crate::types::Status;
use rayon::prelude::*;
use std::sync::Mutex;
use std::thread;

/// Run the plan's scheduler until every step is terminal
pub(crate) fn run(plan: &mut Plan) -> Result<()> {
    let order: Vec<usize> = plan
        .execution_order()?
        .iter()
        .map(|name| plan.index[name])
        .collect();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(plan.options.jobs.max(1))
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let mut idle_passes: u32 = 0;

    while !plan.is_completed() {
        plan.passes += 1;
        let pass = plan.passes;

        let mut progressed = propagate_failures(plan, &order);

        let eligible: Vec<usize> = order
            .iter()
            .copied()
            .filter(|&idx| is_eligible(plan, idx))
            .collect();

        plan.reporter.on_pass_start(pass, eligible.len());

        for (idx, transition) in run_pass(plan, &pool, &eligible, pass) {
            progressed |= apply_transition(plan, idx, transition);
        }

        if plan.is_completed() {
            break;
        }

        if progressed {
            idle_passes = 0;
        } else {
            idle_passes = idle_passes.saturating_add(1);
        }

        if has_submitted(plan) {
            let delay = plan.options.poll.delay_for_attempt(idle_passes);
            if !delay.is_zero() {
                log::trace!("pass {pass}: waiting {delay:?} before polling again");
                thread::sleep(delay);
            }
        }
    }

    Ok(())
}

/// Fail every unfinished step that waits on a failed step
///
/// `order` is topological, so a failure propagates through any number of
/// levels in one sweep.
fn propagate_failures(plan: &mut Plan, order: &[usize]) -> bool {
    let mut changed = false;

    for &idx in order {
        let step = &plan.steps[idx];
        if step.is_terminal() {
            continue;
        }

        let failed_dependency = step
            .requires()
            .iter()
            .find(|dep| plan.status(dep) == Some(Status::Failed))
            .cloned();

        if let Some(dependency) = failed_dependency {
            let transition = Transition {
                status: Status::Failed,
                reason: Some(format!("dependency {dependency} failed")),
            };
            changed |= apply_transition(plan, idx, transition);
        }
    }

    changed
}

fn is_eligible(plan: &Plan, idx: usize) -> bool {
    let step = &plan.steps[idx];
    !step.is_terminal()
        && step
            .requires()
            .iter()
            .all(|dep| plan.status(dep).is_some_and(|s| s.is_satisfied()))
}

fn has_submitted(plan: &Plan) -> bool {
    plan.steps.iter().any(|s| s.status() == Status::Submitted)
}

/// Invoke every eligible step once, in parallel
///
/// Outcomes come back in the order of `eligible`, regardless of which
/// worker finished first.
fn run_pass(
    plan: &Plan,
    pool: &rayon::ThreadPool,
    eligible: &[usize],
    pass: u32,
) -> Vec<(usize, Transition)> {
    if eligible.is_empty() {
        return Vec::new();
    }

    let snapshot = plan.results();
    let reporter = plan.reporter.as_ref();
    let steps = &plan.steps;
    let outcomes: Mutex<Vec<(usize, usize, Transition)>> =
        Mutex::new(Vec::with_capacity(eligible.len()));

    pool.install(|| {
        eligible
            .par_iter()
            .enumerate()
            .for_each(|(position, &idx)| {
                let step = &steps[idx];
                let ctx = RunContext {
                    status: step.status(),
                    pass,
                    polls: step.polls(),
                    results: &snapshot,
                    reporter,
                };
                let transition = step.invoke(&ctx);
                push_outcome(&outcomes, (position, idx, transition));
            });
    });

    let mut collected = into_outcomes(outcomes);
    collected.sort_by_key(|(position, _, _)| *position);
    collected
        .into_iter()
        .map(|(_, idx, transition)| (idx, transition))
        .collect()
}

fn push_outcome(outcomes: &Mutex<Vec<(usize, usize, Transition)>>, outcome: (usize, usize, Transition)) {
    match outcomes.lock() {
        Ok(mut locked) => locked.push(outcome),
        Err(poisoned) => poisoned.into_inner().push(outcome),
    }
}

fn into_outcomes(outcomes: Mutex<Vec<(usize, usize, Transition)>>) -> Vec<(usize, usize, Transition)> {
    match outcomes.into_inner() {
        Ok(collected) => collected,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Assign a run outcome to a step; returns true if the step became terminal
fn apply_transition(plan: &mut Plan, idx: usize, transition: Transition) -> bool {
    let step = &plan.steps[idx];
    let Transition { status, reason } = match (transition.status, plan.options.max_polls) {
        (Status::Submitted, Some(max)) if step.polls() >= max => Transition {
            status: Status::Failed,
            reason: Some(format!("timed out after {max} polls")),
        },
        _ => transition,
    };

    let name = step.name().to_string();
    if !plan.steps[idx].set_status(status, reason.clone()) {
        return false;
    }

    plan.reporter.on_step_status(&name, status, reason.as_deref());
    record_result(&plan.results, &name, status);

    status.is_terminal()
}

fn record_result(results: &Mutex<Results>, name: &str, status: Status) {
    match results.lock() {
        Ok(mut locked) => locked.record(name, status),
        Err(poisoned) => poisoned.into_inner().record(name, status),
    }
}
