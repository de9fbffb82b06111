//! Sub-configuration structs with defaults.

use serde::{Deserialize, Serialize};

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Items processed concurrently per batch
    pub batch_size: usize,

    /// Pause between batches in milliseconds, so a shared runtime is not
    /// starved by back-to-back decode work
    pub batch_pause_ms: u64,

    /// Supported input formats (extensions)
    pub supported_formats: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_pause_ms: 50,
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
                "bmp".to_string(),
                "tiff".to_string(),
            ],
        }
    }
}

/// Default compression profile values, overridable per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Encoder quality, 0-100
    pub quality: u8,

    /// Maximum output width in pixels
    pub max_width: u32,

    /// Maximum output height in pixels
    pub max_height: u32,

    /// Output format: "jpeg", "png" or "webp"
    pub format: String,

    /// Explicit byte budget in kilobytes; absent means the 10 MB default
    /// ceiling applies
    pub target_size_kb: Option<u64>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            max_width: 2400,
            max_height: 1600,
            format: "jpeg".to_string(),
            target_size_kb: None,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum input file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum decoded image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode/encode timeout in milliseconds
    pub codec_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            codec_timeout_ms: 10000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
