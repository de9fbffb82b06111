//! Photo processing pipeline components.
//!
//! The stages, in the order a run uses them:
//! - **discovery**: find image files and load them into memory
//! - **compress**: transcode an image against a compression profile
//! - **matcher**: pair primary items with located reference items by time
//! - **scheduler**: fixed-size concurrent batches with failure isolation
//! - **runner**: orchestrates a full run and produces the report

pub mod compress;
pub mod discovery;
pub mod matcher;
pub mod runner;
pub mod scheduler;

// Re-exports for convenient access
pub use compress::CompressionEngine;
pub use discovery::{load_source, DiscoveredFile, FileDiscovery};
pub use matcher::{ReferenceRecord, TemporalMatcher, MATCH_WINDOW_MS};
pub use runner::{PipelineRunner, RunHandle, RunMode, RunReport};
pub use scheduler::{BatchScheduler, CancelToken, ItemOutcome};
