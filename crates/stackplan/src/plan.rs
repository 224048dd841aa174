//! Execution plan - steps and the edges between them

use crate::context::{LogReporter, Reporter, Results, RunContext};
use crate::error::{Error, Result};
use crate::executor;
use crate::graph::topological_order;
use crate::step::Step;
use crate::types::{PlanOptions, PlanSummary, Stack, Status};
use log::Level;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// An ordered collection of steps for one invocation
///
/// A plan is single-use: build it, optionally outline it, optionally
/// execute it, then drop it. Outlining marks every step complete, so a
/// plan that has been outlined cannot be executed meaningfully afterwards.
pub struct Plan {
    pub(crate) description: String,
    pub(crate) steps: Vec<Step>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) options: PlanOptions,
    pub(crate) reporter: Arc<dyn Reporter>,
    pub(crate) results: Mutex<Results>,
    pub(crate) passes: u32,
}

impl Plan {
    /// Create an empty plan
    pub fn new(description: impl Into<String>, options: PlanOptions, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            description: description.into(),
            steps: Vec::new(),
            index: HashMap::new(),
            options,
            reporter,
            results: Mutex::new(Results::default()),
            passes: 0,
        }
    }

    /// Create a plan with default options that logs through `log`
    pub fn with_defaults(description: impl Into<String>) -> Self {
        Self::new(description, PlanOptions::default(), Arc::new(LogReporter))
    }

    /// Register a step for `stack`
    ///
    /// `requires` names the stacks whose steps must be terminal before this
    /// one may run. Each stack may only be added once.
    pub fn add<F, I, S>(&mut self, stack: Arc<Stack>, run: F, requires: I) -> Result<()>
    where
        F: Fn(&Stack, &RunContext<'_>) -> anyhow::Result<Status> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.index.contains_key(&stack.name) {
            return Err(Error::DuplicateStep {
                name: stack.name.clone(),
            });
        }

        let requires: BTreeSet<String> = requires.into_iter().map(Into::into).collect();
        self.index.insert(stack.name.clone(), self.steps.len());
        self.steps.push(Step::new(stack, Box::new(run), requires));
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    /// Steps in the order they were added
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.index.get(name).map(|&i| &self.steps[i])
    }

    pub fn status(&self, name: &str) -> Option<Status> {
        self.step(name).map(Step::status)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether every step has reached a terminal status
    pub fn is_completed(&self) -> bool {
        self.steps.iter().all(Step::is_terminal)
    }

    /// Snapshot of the statuses recorded so far
    pub fn results(&self) -> Results {
        match self.results.lock() {
            Ok(locked) => locked.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Order in which steps become runnable
    ///
    /// Every step comes after all of the steps it requires; independent
    /// steps are ordered by stack name.
    pub fn execution_order(&self) -> Result<Vec<String>> {
        let mut edges = BTreeMap::new();
        for step in &self.steps {
            if let Some(dependency) = step.requires().iter().find(|d| !self.index.contains_key(*d)) {
                return Err(Error::UnknownDependency {
                    step: step.name().to_string(),
                    dependency: dependency.clone(),
                });
            }
            edges.insert(step.name().to_string(), step.requires().clone());
        }
        topological_order(&edges)
    }

    /// Log the execution order without running anything
    ///
    /// Each step is marked complete as it is listed. No run function is
    /// invoked. With `execute_hint`, a closing line tells the user how to
    /// actually execute the plan.
    pub fn outline(&mut self, level: Level, execute_hint: bool) -> Result<Vec<String>> {
        let order = self.execution_order()?;

        self.reporter
            .log(level, &format!("Plan \"{}\":", self.description));

        for (position, name) in order.iter().enumerate() {
            let idx = self.index[name];
            let step = &mut self.steps[idx];
            let requires = step
                .requires()
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ");

            self.reporter.log(
                level,
                &format!(
                    "  - step: {}: target: \"{}\", requires: [{}]",
                    position + 1,
                    name,
                    requires
                ),
            );
            step.set_status(Status::Complete, None);
        }

        if execute_hint {
            self.reporter
                .log(level, "To execute this plan, run with \"--force\" flag.");
        }

        Ok(order)
    }

    /// Run every step to a terminal status
    ///
    /// Returns the summary when every step ended complete or skipped, and
    /// [`Error::StepsFailed`] once the plan has fully drained otherwise.
    pub fn execute(&mut self) -> Result<PlanSummary> {
        executor::run(self)?;

        let summary = self.summary();
        if summary.is_success() {
            return Ok(summary);
        }

        let order = self.execution_order()?;
        let failed = order
            .into_iter()
            .filter(|name| self.status(name) == Some(Status::Failed))
            .collect();
        Err(Error::StepsFailed { failed })
    }

    /// Summary of step statuses so far
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            passes: self.passes,
            ..Default::default()
        };
        for step in &self.steps {
            summary.add_status(step.status());
        }
        summary
    }
}
