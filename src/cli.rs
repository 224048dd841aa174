use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Build and tear down dependent infrastructure stacks in order", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ./stackctl.toml, then the config dir)
    #[arg(short, long, global = true, env = crate::paths::ENV_CONFIG)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Destroy every configured stack, dependents first
    Destroy(LifecycleArgs),

    /// Create or update every configured stack, requirements first
    Build(LifecycleArgs),

    /// Show configured stacks and their remote status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct LifecycleArgs {
    /// Execute the plan instead of only printing it
    #[arg(short, long)]
    pub force: bool,

    /// Number of stacks acted on concurrently (overrides plan.jobs)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
