//! Configuration validation.

use super::Config;
use crate::error::ConfigError;

impl Config {
    /// Validate configuration values, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "processing.batch_size must be at least 1".to_string(),
            ));
        }

        if self.processing.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.supported_formats must not be empty".to_string(),
            ));
        }

        if self.profile.quality > 100 {
            return Err(ConfigError::ValidationError(format!(
                "profile.quality must be 0-100, got {}",
                self.profile.quality
            )));
        }

        if self.profile.max_width == 0 || self.profile.max_height == 0 {
            return Err(ConfigError::ValidationError(
                "profile.max_width and profile.max_height must be positive".to_string(),
            ));
        }

        if self.profile.format.parse::<crate::profile::OutputFormat>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "profile.format must be jpeg, png or webp, got {:?}",
                self.profile.format
            )));
        }

        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be positive".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "logging.level must be one of error/warn/info/debug/trace, got {other:?}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.processing.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_format_rejected() {
        let mut config = Config::default();
        config.profile.format = "gif".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let mut config = Config::default();
        config.profile.max_height = 0;
        assert!(config.validate().is_err());
    }
}
