// Plan-driven lifecycle commands
pub mod lifecycle;

// Read-only commands
pub mod status;
