//! Progress display for plan execution.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::Level;
use stackplan::{LogReporter, Reporter, Status};

/// Reporter that logs through `log` and drives a progress bar
///
/// The bar counts steps that reached a terminal status. Messages at info
/// or above are user-facing (the plan outline) and go to stdout; the rest
/// go through `log`. Either way they are printed above the bar.
pub struct ProgressReporter {
    bar: ProgressBar,
    inner: LogReporter,
}

impl ProgressReporter {
    pub fn new(total: usize, quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self {
            bar,
            inner: LogReporter,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Reporter for ProgressReporter {
    fn log(&self, level: Level, message: &str) {
        self.bar.suspend(|| {
            if level <= Level::Info {
                println!("{message}");
            } else {
                self.inner.log(level, message);
            }
        });
    }

    fn on_pass_start(&self, pass: u32, eligible: usize) {
        log::trace!("pass {pass}: {eligible} eligible step(s)");
        self.bar.tick();
    }

    fn on_step_status(&self, name: &str, status: Status, reason: Option<&str>) {
        self.bar
            .suspend(|| self.inner.on_step_status(name, status, reason));

        match status {
            Status::Submitted => self.bar.set_message(format!("waiting on {name}")),
            Status::Complete | Status::Skipped => {
                self.bar.inc(1);
                self.bar.set_message(name.to_string());
            }
            Status::Failed => {
                self.bar.inc(1);
                self.bar.suspend(|| {
                    eprintln!(
                        "  {} {} ({})",
                        "✗".red(),
                        name,
                        reason.unwrap_or("failed")
                    );
                });
            }
            Status::Pending => {}
        }
    }
}
