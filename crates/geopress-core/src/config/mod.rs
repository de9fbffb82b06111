//! Configuration management for geopress.
//!
//! Configuration is loaded from a platform config directory with sensible
//! defaults; every section can be omitted.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::profile::{CompressionProfile, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for geopress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Processing settings
    pub processing: ProcessingConfig,

    /// Default compression profile
    pub profile: ProfileConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories, falling back to
    /// `~/.geopress/config.toml` if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "geopress", "geopress")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                let expanded = shellexpand::tilde(&home);
                PathBuf::from(expanded.into_owned())
                    .join(".geopress")
                    .join("config.toml")
            })
    }

    /// Build a [`CompressionProfile`] from the configured defaults.
    pub fn default_profile(&self) -> CompressionProfile {
        let format = self
            .profile
            .format
            .parse::<OutputFormat>()
            .unwrap_or(OutputFormat::Jpeg);
        CompressionProfile::new(
            self.profile.quality,
            self.profile.max_width,
            self.profile.max_height,
            self.profile.target_size_kb.map(|kb| kb * 1024),
            format,
        )
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
