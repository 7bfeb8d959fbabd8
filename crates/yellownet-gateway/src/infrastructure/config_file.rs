//! Optional TOML configuration file.
//!
//! Every key is optional; a missing key keeps whatever value the
//! configuration already had.  Example:
//!
//! ```toml
//! device = "/dev/ttyACM1"
//! baud_rate = 115200
//! poll_timeout_ms = 20
//! address = "yellow.example:8080"
//! auto_approve = false
//! log_level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::GatewayConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk configuration schema.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Serial device node.
    pub device: Option<PathBuf>,
    /// Serial line speed.
    pub baud_rate: Option<u32>,
    /// Serial read timeout per poll step, in milliseconds.
    pub poll_timeout_ms: Option<u64>,
    /// Tunnel address to connect to at startup.
    pub address: Option<String>,
    /// Accept every `set_address` without prompting.
    pub auto_approve: Option<bool>,
    /// Default `tracing` filter.
    pub log_level: Option<String>,
}

impl ConfigFile {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, wrongly typed
    /// values, or unknown keys.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overwrites the fields of `config` that this file sets.
    pub fn apply_to(&self, config: &mut GatewayConfig) {
        if let Some(device) = &self.device {
            config.device_path = device.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.baud_rate = baud_rate;
        }
        if let Some(ms) = self.poll_timeout_ms {
            config.poll_timeout = Duration::from_millis(ms);
        }
        if let Some(address) = &self.address {
            config.initial_address = Some(address.clone());
        }
        if let Some(auto_approve) = self.auto_approve {
            config.auto_approve = auto_approve;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if its contents are not a valid configuration.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigFile::from_toml(&text)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
