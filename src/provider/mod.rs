//! Provider construction from configuration

pub mod local;

pub use local::LocalProvider;

use crate::config::{ProviderKind, StackctlConfig};
use anyhow::Result;
use std::sync::Arc;

/// Build the provider named by the config
pub fn from_config(config: &StackctlConfig) -> Result<Arc<LocalProvider>> {
    match config.provider.kind {
        ProviderKind::Local => {
            let path = config.state_file()?;
            log::debug!(
                "Using local provider at {} (settle {}s)",
                path.display(),
                config.provider.settle_secs
            );
            Ok(Arc::new(LocalProvider::new(path, config.provider.settle_secs)))
        }
    }
}
