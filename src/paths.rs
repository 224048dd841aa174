//! Path resolution for stackctl
//!
//! # Environment Variables
//!
//! - `STACKCTL_CONFIG` - Config file to use when `--config` is not given
//!   (read by clap into the `--config` argument)
//! - `STACKCTL_STATE_DIR` - Override state directory
//!
//! # Config File Resolution Priority
//!
//! 1. `--config` flag or `STACKCTL_CONFIG`
//! 2. `./stackctl.toml` if it exists
//! 3. `<config_dir>/stackctl/stackctl.toml`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file
pub const ENV_CONFIG: &str = "STACKCTL_CONFIG";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "STACKCTL_STATE_DIR";

/// File name looked up in the working directory and config directory
pub const CONFIG_FILE_NAME: &str = "stackctl.toml";

/// Get the stackctl config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("stackctl");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join("stackctl"))
}

/// Get the stackctl state directory path
///
/// Priority:
/// 1. `STACKCTL_STATE_DIR` env var
/// 2. `XDG_STATE_HOME/stackctl`
/// 3. `~/.local/state/stackctl`
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("stackctl");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".local").join("state").join("stackctl"))
}

/// Default location of the local provider's state file
pub fn default_state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join("state.json"))
}

/// Find the config file to load
///
/// `explicit` is the `--config` value, which clap fills from
/// `STACKCTL_CONFIG` when the flag is absent.
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Could not determine working directory")?;
    resolve_config_file(explicit, &cwd, config_dir)
}

/// Resolution step behind [`config_file`]
///
/// `config_dir` is only consulted when nothing else matched.
pub fn resolve_config_file(
    explicit: Option<&Path>,
    cwd: &Path,
    config_dir: impl FnOnce() -> Result<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        log::debug!("Using config from --config: {}", path.display());
        return Ok(expand(&path.to_string_lossy()));
    }

    let local = cwd.join(CONFIG_FILE_NAME);
    if local.exists() {
        log::debug!("Using config from working directory: {}", local.display());
        return Ok(local);
    }

    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
