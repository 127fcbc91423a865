//! Console configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no
//! file) yields the stock console.
//!
//! ```toml
//! device_name = "console"
//! reader_name = "debug-reader"
//! reader_policy = "stop-on-release"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid console config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid console config: {0}")]
    Invalid(String),
}

/// What happens to the reader task when the device is released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReaderPolicy {
    /// Leave the reader running for the life of the process
    #[default]
    Persist,

    /// Stop and join the reader before destroying the device
    StopOnRelease,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    /// Name the device is published under
    pub device_name: String,

    /// Reader thread name
    pub reader_name: String,

    pub reader_policy: ReaderPolicy,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            device_name: "console".into(),
            reader_name: "debug-reader".into(),
            reader_policy: ReaderPolicy::default(),
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("console: loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.trim().is_empty() {
            return Err(ConfigError::Invalid("device_name must not be empty".into()));
        }
        if self.reader_name.trim().is_empty() {
            return Err(ConfigError::Invalid("reader_name must not be empty".into()));
        }
        Ok(())
    }
}
