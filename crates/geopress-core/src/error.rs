//! Error types for the geopress pipeline.
//!
//! Errors are organized by stage so a failure always names the item and the
//! stage that rejected it. Metadata *parse* problems are deliberately not
//! represented here: extraction degrades to partial metadata instead of
//! failing (see `metadata::MetadataExtractor`).

use thiserror::Error;

/// Top-level error type for geopress operations.
#[derive(Error, Debug)]
pub enum GeopressError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-item pipeline errors. Each one is item-scoped: the batch scheduler
/// converts these into outcomes rather than letting them abort a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The codec rejected the input (corrupt bytes, unsupported source)
    #[error("Compression failed for {name}: {message}")]
    Compression { name: String, message: String },

    /// Image decoding failed before encoding was attempted
    #[error("Decode failed for {name}: {message}")]
    Decode { name: String, message: String },

    /// The artifact format has no writable metadata slot
    #[error("No writable metadata slot in {format} output for {name}")]
    MetadataWrite { name: String, format: String },

    /// Codec call exceeded its time budget
    #[error("Timeout in {stage} stage for {name} after {timeout_ms}ms")]
    Timeout {
        name: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Input exceeds the configured file size limit
    #[error("File too large: {name} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        name: String,
        size_mb: u64,
        max_mb: u64,
    },

    /// Decoded dimensions exceed the configured limit
    #[error("Image too large: {name} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        name: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported output or source format
    #[error("Unsupported format for {name}: {format}")]
    UnsupportedFormat { name: String, format: String },

    /// A worker task failed outside its own error path (join failure, panic)
    #[error("Worker task failed: {message}")]
    Task { message: String },

    /// The reference-set extraction phase failed before any item was
    /// attempted. This is the only run-level failure.
    #[error("Reference metadata phase failed: {0}")]
    ReferencePhase(String),
}

/// Convenience type alias for geopress results.
pub type Result<T> = std::result::Result<T, GeopressError>;

/// Convenience type alias for per-item pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
