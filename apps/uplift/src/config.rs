//! CLI configuration.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/uplift/uplift.toml`, falling back to
//! `~/.config/uplift/uplift.toml`. A missing file yields the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use uplift_protocol::{QueueOptions, TransportConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpliftConfig {
    /// Scheduling options for the queue.
    #[serde(default)]
    pub queue: QueueOptions,

    /// Where files are sent. `endpoint` is required if the section is present.
    #[serde(default)]
    pub transport: TransportConfig,
}

impl UpliftConfig {
    /// Loads `path`, or the default location when `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(),
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: UpliftConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid configuration {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Returns the default configuration file path.
pub fn config_path() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = std::env::var_os("HOME").unwrap_or_else(|| "/tmp".into());
            PathBuf::from(home).join(".config")
        });
    base.join("uplift").join("uplift.toml")
}
