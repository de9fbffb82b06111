//! Geopress Core - batch photo compression with GPS location sync.
//!
//! Geopress is a pure processing pipeline: it takes two sets of in-memory
//! images (a primary set to compress and an optional reference set carrying
//! GPS data), transcodes the primary set against a compression profile, and
//! writes the temporally closest reference coordinate into each compressed
//! output's metadata block.
//!
//! # Architecture
//!
//! ```text
//! Primary   → Compress ─┐
//!                       ├→ Match by time → Write GPS → Records + Stats
//! Reference → Extract ──┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use geopress_core::{
//!     CancelToken, CompressionProfile, Config, NullObserver, PipelineRunner, RunMode,
//! };
//!
//! #[tokio::main]
//! async fn main() -> geopress_core::Result<()> {
//!     let runner = PipelineRunner::new(Config::load()?);
//!     let report = runner
//!         .run(
//!             primary_images,
//!             reference_images,
//!             CompressionProfile::default(),
//!             RunMode::CompressAndSync,
//!             Arc::new(NullObserver),
//!             CancelToken::new(),
//!         )
//!         .await?;
//!     println!("{} items synced", report.stats.synced);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod events;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod profile;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, GeopressError, PipelineError, PipelineResult, Result};
pub use events::{LogSeverity, NullObserver, RunObserver};
pub use metadata::{LocationSyncWriter, MetadataExtractor};
pub use naming::{export_name, NamingPolicy};
pub use pipeline::{
    CancelToken, CompressionEngine, PipelineRunner, RunHandle, RunMode, RunReport,
};
pub use profile::{CompressionProfile, OutputFormat, DEFAULT_SIZE_CEILING};
pub use types::{
    CapturedMetadata, CompressedArtifact, GeoPoint, MatchResult, ProcessedRecord, RecordSummary,
    RunStats, SourceImage,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
