//! Host configuration
//!
//! Loaded from a TOML file in the platform config directory. A missing
//! file is not an error; every field has a default.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Serial port to use, or "auto" to discover by USB ids
    pub port: String,
    /// Delay between reconnection attempts
    pub reconnect_delay_ms: u64,
    /// How long to wait for an `Identify` on each candidate port
    pub identify_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: "auto".into(),
            reconnect_delay_ms: 3000,
            identify_timeout_ms: 2500,
        }
    }
}

impl HostConfig {
    pub fn load(path: &Path) -> Result<Self, HostError> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

/// Platform config file location, e.g. `~/.config/rondo/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rondo").join("config.toml"))
}
