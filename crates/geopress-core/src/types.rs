//! Core data types for the geopress pipeline.
//!
//! A run consumes immutable [`SourceImage`]s and produces one
//! [`ProcessedRecord`] per successfully processed primary-set item, plus
//! aggregate [`RunStats`]. All per-run state lives in these values; nothing
//! is shared across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::profile::OutputFormat;

/// An input image as handed to the pipeline. Read-only for the whole run.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Raw file bytes
    pub bytes: Vec<u8>,
    /// Display name (filename, no directory)
    pub name: String,
    /// Size of `bytes`
    pub byte_size: u64,
    /// Declared mime type (e.g. "image/jpeg")
    pub mime_type: String,
    /// File-system last-modified instant, used as the timestamp fallback
    pub modified_at: DateTime<Utc>,
}

impl SourceImage {
    pub fn new(
        name: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        let byte_size = bytes.len() as u64;
        Self {
            bytes,
            name: name.into(),
            byte_size,
            mime_type: mime_type.into(),
            modified_at,
        }
    }
}

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Camera identification, best-effort from EXIF.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CameraInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Capture settings, best-effort from EXIF.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureSettings {
    /// ISO sensitivity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,
    /// Aperture (e.g. "f/1.8")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    /// Exposure time (e.g. "1/1000")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure: Option<String>,
}

/// Metadata recovered from one image's embedded binary segment.
///
/// Extracted once per image per run. A `None` timestamp means no usable
/// capture date was found; the caller resolves it to the file modification
/// time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapturedMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<CaptureSettings>,
}

/// Output of one successful compression call.
///
/// Never mutated after creation, except that the location-sync writer may
/// produce a copy with a rewritten metadata block (pixel payload untouched).
#[derive(Debug, Clone)]
pub struct CompressedArtifact {
    /// Compressed output bytes
    pub bytes: Vec<u8>,
    /// Achieved size of `bytes` (reported, never assumed equal to target)
    pub byte_size: u64,
    /// Resolved output format
    pub format: OutputFormat,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
}

/// A reference-to-primary pairing produced by the temporal matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Name of the primary-set item being matched
    pub primary_name: String,
    /// Filename of the closest reference-set item
    pub reference_name: String,
    /// Absolute time delta in milliseconds
    pub delta_ms: i64,
}

/// Terminal per-item output of the pipeline.
#[derive(Debug, Clone)]
pub struct ProcessedRecord {
    /// The original primary-set input
    pub source: Arc<SourceImage>,
    /// The compressed result
    pub artifact: CompressedArtifact,
    /// Whether a reference coordinate was written into the artifact
    pub location_synced: bool,
    /// Filename of the matched reference item, when one was used
    pub matched_reference: Option<String>,
}

impl ProcessedRecord {
    /// Serializable view of this record, without the byte payloads.
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            original_name: self.source.name.clone(),
            original_size: self.source.byte_size,
            compressed_size: self.artifact.byte_size,
            width: self.artifact.width,
            height: self.artifact.height,
            format: self.artifact.format,
            location_synced: self.location_synced,
            matched_reference: self.matched_reference.clone(),
        }
    }
}

/// JSON-friendly projection of a [`ProcessedRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSummary {
    pub original_name: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub location_synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_reference: Option<String>,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunStats {
    /// Total primary-set items attempted
    pub attempted: usize,
    /// Items that produced a record
    pub succeeded: usize,
    /// Items that failed compression
    pub failed: usize,
    /// Records with a synced location
    pub synced: usize,
    /// Sum of original byte sizes over succeeded items
    pub bytes_before: u64,
    /// Sum of compressed byte sizes over succeeded items
    pub bytes_after: u64,
}

impl RunStats {
    /// Space saved as a percentage of the original bytes, rounded.
    pub fn compression_ratio_percent(&self) -> u32 {
        if self.bytes_before == 0 {
            return 0;
        }
        let saved = 1.0 - self.bytes_after as f64 / self.bytes_before as f64;
        (saved * 100.0).round().max(0.0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_image_size() {
        let img = SourceImage::new("a.jpg", vec![0u8; 42], "image/jpeg", Utc::now());
        assert_eq!(img.byte_size, 42);
    }

    #[test]
    fn test_compression_ratio() {
        let stats = RunStats {
            bytes_before: 1000,
            bytes_after: 250,
            ..Default::default()
        };
        assert_eq!(stats.compression_ratio_percent(), 75);
    }

    #[test]
    fn test_compression_ratio_empty_run() {
        let stats = RunStats::default();
        assert_eq!(stats.compression_ratio_percent(), 0);
    }

    #[test]
    fn test_compression_ratio_never_negative() {
        // Output grew (tiny input, codec overhead) - ratio clamps to zero
        let stats = RunStats {
            bytes_before: 100,
            bytes_after: 180,
            ..Default::default()
        };
        assert_eq!(stats.compression_ratio_percent(), 0);
    }

    #[test]
    fn test_record_summary_skips_none_reference() {
        let summary = RecordSummary {
            original_name: "a.jpg".into(),
            original_size: 100,
            compressed_size: 50,
            width: 10,
            height: 10,
            format: OutputFormat::Jpeg,
            location_synced: false,
            matched_reference: None,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains("matched_reference"));
        assert!(json.contains("\"location_synced\":false"));
    }
}
