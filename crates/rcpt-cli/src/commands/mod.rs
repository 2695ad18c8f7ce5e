//! CLI subcommands.

pub mod batch;
pub mod config;
pub mod extract;
pub mod scan;

use std::path::Path;

use rcpt_core::RcptConfig;
use tracing::debug;

/// Load the explicit config file, else the user config if present, else defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RcptConfig> {
    if let Some(path) = path {
        return RcptConfig::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e));
    }

    let user_config = config::default_config_path();
    if user_config.exists() {
        debug!("Using config at {}", user_config.display());
        Ok(RcptConfig::from_file(&user_config)?)
    } else {
        Ok(RcptConfig::default())
    }
}
