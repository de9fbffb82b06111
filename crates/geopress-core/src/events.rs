//! Observer interface for progress and log events.
//!
//! The pipeline never touches presentation state directly: it emits
//! structured events through [`RunObserver`] and the UI/CLI layer decides
//! how to render them. Events are informational only and not required for
//! correctness.

use serde::{Deserialize, Serialize};

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Success,
    Error,
}

/// Receives progress and log notifications from a run.
///
/// Implementations must tolerate concurrent calls: progress events are
/// emitted as items settle inside a batch.
pub trait RunObserver: Send + Sync {
    /// Emitted after each item settles.
    fn on_progress(&self, processed: usize, total: usize, current_item: &str);

    /// Emitted per notable step (compression start/finish, match found or
    /// not, extraction failure).
    fn on_log(&self, severity: LogSeverity, message: &str);
}

/// An observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn on_progress(&self, _processed: usize, _total: usize, _current_item: &str) {}
    fn on_log(&self, _severity: LogSeverity, _message: &str) {}
}
