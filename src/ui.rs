use colored::{ColoredString, Colorize};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Colour a provider status token by what it means
pub fn remote_status(status: &str) -> ColoredString {
    if status.ends_with("_FAILED") {
        status.red()
    } else if status.ends_with("_IN_PROGRESS") {
        status.yellow()
    } else if status.ends_with("_COMPLETE") {
        status.green()
    } else {
        status.normal()
    }
}

/// Pad `text` to `width` columns, counting characters
pub fn pad(text: &str, width: usize) -> String {
    format!("{text:<width$}")
}

/// One-line summary of how a plan ended
pub fn plan_summary(summary: &stackplan::PlanSummary) -> String {
    format!(
        "{} complete, {} skipped, {} failed in {} pass(es)",
        summary.complete, summary.skipped, summary.failed, summary.passes
    )
}

// ============================================================================
// Tests
// ============================================================================
