use anyhow::Result;
use colored::Colorize;
use stackplan::Provider;
use std::collections::BTreeSet;

use crate::Context;
use crate::config::StackctlConfig;
use crate::provider;
use crate::ui;

/// One configured stack and what the provider says about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackStatus {
    pub name: String,
    pub fqn: String,
    /// Provider status token, `None` when the stack does not exist remotely
    pub remote: Option<String>,
    pub requires: BTreeSet<String>,
}

pub fn run(ctx: &Context) -> Result<()> {
    let (config, path) = StackctlConfig::load(ctx.config.as_deref())?;
    let provider = provider::from_config(&config)?;

    ui::header("Stack Status");
    ui::kv("Config", &path.display().to_string());
    ui::kv("State", &provider.path().display().to_string());
    if let Some(ns) = &config.namespace {
        ui::kv("Namespace", ns);
    }
    println!();

    let statuses = collect(&config, provider.as_ref())?;
    if statuses.is_empty() {
        ui::warn("No stacks configured");
        return Ok(());
    }

    let width = statuses.iter().map(|s| s.name.len()).max().unwrap_or(0);
    for status in &statuses {
        let remote = match &status.remote {
            Some(token) => ui::remote_status(token),
            None => "absent".dimmed(),
        };
        println!("  {}  {}", ui::pad(&status.name, width).bold(), remote);

        if ctx.verbose > 0 {
            ui::dim(&format!("    fqn: {}", status.fqn));
            if !status.requires.is_empty() {
                let requires: Vec<&str> = status.requires.iter().map(String::as_str).collect();
                ui::dim(&format!("    requires: {}", requires.join(", ")));
            }
        }
    }

    let known: BTreeSet<&str> = statuses.iter().map(|s| s.fqn.as_str()).collect();
    let orphans: Vec<String> = provider
        .records()?
        .into_iter()
        .filter(|r| !known.contains(r.name.as_str()))
        .map(|r| r.name)
        .collect();
    if !orphans.is_empty() {
        println!();
        ui::info(&format!(
            "{} stack(s) in state but not in config: {}",
            orphans.len(),
            orphans.join(", ")
        ));
    }

    println!();
    Ok(())
}

/// Look up every configured stack
///
/// Requirements come from the remote side when the stack exists, since
/// that is what a destroy would act on, and from the config otherwise.
pub fn collect(config: &StackctlConfig, provider: &dyn Provider) -> Result<Vec<StackStatus>> {
    config
        .stacks()
        .iter()
        .map(|stack| -> Result<StackStatus> {
            let remote = provider.get_stack(&stack.fqn)?;
            let requires = match &remote {
                Some(remote) => provider.required_stacks(remote)?,
                None => stack.requires.clone(),
            };
            Ok(StackStatus {
                name: stack.name.clone(),
                fqn: stack.fqn.clone(),
                remote: remote.map(|r| provider.get_stack_status(&r)),
                requires,
            })
        })
        .collect()
}
