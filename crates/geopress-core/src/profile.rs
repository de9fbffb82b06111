//! Compression profiles: quality, dimension and size-budget configuration
//! for one run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default output ceiling applied when no explicit target size is set, so
/// pathological inputs cannot balloon the output.
pub const DEFAULT_SIZE_CEILING: u64 = 10 * 1024 * 1024;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// File extension for this format (no dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Configuration bundle governing one run's compression behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionProfile {
    /// Encoder quality, 0-100. Advisory to the codec.
    pub quality: u8,
    /// Maximum output width in pixels
    pub max_width: u32,
    /// Maximum output height in pixels
    pub max_height: u32,
    /// Explicit byte budget. `None` means the default ceiling applies.
    pub target_size_bytes: Option<u64>,
    /// Output format for every item in the run
    pub output_format: OutputFormat,
}

impl CompressionProfile {
    /// Build a profile, clamping quality into 0-100.
    pub fn new(
        quality: u8,
        max_width: u32,
        max_height: u32,
        target_size_bytes: Option<u64>,
        output_format: OutputFormat,
    ) -> Self {
        Self {
            quality: quality.min(100),
            max_width: max_width.max(1),
            max_height: max_height.max(1),
            target_size_bytes,
            output_format,
        }
    }

    /// The effective byte budget: explicit target wins, otherwise the
    /// default ceiling.
    pub fn size_budget(&self) -> u64 {
        self.target_size_bytes.unwrap_or(DEFAULT_SIZE_CEILING)
    }
}

impl Default for CompressionProfile {
    fn default() -> Self {
        Self {
            quality: 85,
            max_width: 2400,
            max_height: 1600,
            target_size_bytes: None,
            output_format: OutputFormat::Jpeg,
        }
    }
}

/// Resolve output dimensions against the profile maxima.
///
/// Scale-down only: a width overflow is corrected first, then any residual
/// height overflow. Rounded to the nearest integer, never below 1, and
/// never above the original dimensions.
pub fn resolve_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let mut w = width as f64;
    let mut h = height as f64;

    if w > max_width as f64 {
        let factor = max_width as f64 / w;
        w *= factor;
        h *= factor;
    }
    if h > max_height as f64 {
        let factor = max_height as f64 / h;
        w *= factor;
        h *= factor;
    }

    let w = (w.round() as u32).clamp(1, width);
    let h = (h.round() as u32).clamp(1, height);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_clamped() {
        let profile = CompressionProfile::new(150, 100, 100, None, OutputFormat::Jpeg);
        assert_eq!(profile.quality, 100);
    }

    #[test]
    fn test_size_budget_default_ceiling() {
        let profile = CompressionProfile::default();
        assert_eq!(profile.size_budget(), DEFAULT_SIZE_CEILING);
    }

    #[test]
    fn test_size_budget_explicit_target_wins() {
        let profile = CompressionProfile::new(85, 100, 100, Some(500_000), OutputFormat::Jpeg);
        assert_eq!(profile.size_budget(), 500_000);
    }

    #[test]
    fn test_resolve_dimensions_no_change_when_within_limits() {
        assert_eq!(resolve_dimensions(800, 600, 2400, 1600), (800, 600));
    }

    #[test]
    fn test_resolve_dimensions_never_upscales() {
        // Tiny image with huge maxima stays untouched
        assert_eq!(resolve_dimensions(10, 20, 4000, 4000), (10, 20));
    }

    #[test]
    fn test_resolve_dimensions_width_overflow() {
        // 4800x3200 into 2400x1600: width halves, height follows, then the
        // residual height is exactly at the limit
        assert_eq!(resolve_dimensions(4800, 3200, 2400, 1600), (2400, 1600));
    }

    #[test]
    fn test_resolve_dimensions_height_only_overflow() {
        // Width within limits, height not: both scale by the height factor
        let (w, h) = resolve_dimensions(1000, 3200, 2400, 1600);
        assert_eq!(h, 1600);
        assert_eq!(w, 500);
    }

    #[test]
    fn test_resolve_dimensions_two_stage_scale() {
        // Width scale alone leaves height over the limit, forcing a second pass
        let (w, h) = resolve_dimensions(4800, 4800, 2400, 1600);
        assert!(w <= 2400);
        assert_eq!(h, 1600);
        assert_eq!(w, 1600);
    }

    #[test]
    fn test_resolve_dimensions_never_exceeds_maxima() {
        for (w0, h0) in [(5000, 3333), (3000, 2001), (2401, 1601), (9999, 123)] {
            let (w, h) = resolve_dimensions(w0, h0, 2400, 1600);
            assert!(w <= 2400, "{w0}x{h0} gave width {w}");
            assert!(h <= 1600, "{w0}x{h0} gave height {h}");
            assert!(w <= w0 && h <= h0, "{w0}x{h0} upscaled to {w}x{h}");
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("jpeg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("WEBP".parse::<OutputFormat>().unwrap(), OutputFormat::WebP);
        assert!("bmp".parse::<OutputFormat>().is_err());
    }
}
