//! Image transcoding against a compression profile, with limits and timeout.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metadata;
use crate::profile::{resolve_dimensions, CompressionProfile, OutputFormat};
use crate::types::{CompressedArtifact, SourceImage};

/// Lowest quality the budget loop will step down to.
const QUALITY_FLOOR: u8 = 10;
/// Quality decrement per budget-loop iteration.
const QUALITY_STEP: u8 = 10;

/// Transcodes source images into compressed artifacts.
///
/// Decoding and encoding are CPU-bound and run on the blocking pool under a
/// configurable timeout, the same item never being touched twice in one run.
pub struct CompressionEngine {
    limits: LimitsConfig,
}

impl CompressionEngine {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Compress one source image according to `profile`.
    ///
    /// Inputs over the configured file-size or dimension limits are
    /// rejected before (or right after) decode. The reported artifact size
    /// is the achieved size; when even the minimum quality cannot meet the
    /// byte budget the smallest achievable output is returned.
    pub async fn compress(
        &self,
        source: Arc<SourceImage>,
        profile: CompressionProfile,
    ) -> PipelineResult<CompressedArtifact> {
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if source.byte_size > max_bytes {
            return Err(PipelineError::FileTooLarge {
                name: source.name.clone(),
                size_mb: source.byte_size / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let timeout_duration = Duration::from_millis(self.limits.codec_timeout_ms);
        let max_dim = self.limits.max_image_dimension;
        let src = Arc::clone(&source);

        let result = timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || Self::compress_sync(&src, &profile, max_dim)),
        )
        .await;

        match result {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(e)) => Err(PipelineError::Task {
                message: e.to_string(),
            }),
            Err(_) => Err(PipelineError::Timeout {
                name: source.name.clone(),
                stage: "compress".to_string(),
                timeout_ms: self.limits.codec_timeout_ms,
            }),
        }
    }

    /// Synchronous decode + resize + encode (runs in spawn_blocking).
    fn compress_sync(
        source: &SourceImage,
        profile: &CompressionProfile,
        max_dim: u32,
    ) -> PipelineResult<CompressedArtifact> {
        let reader = image::ImageReader::new(Cursor::new(&source.bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                name: source.name.clone(),
                message: format!("Cannot detect image format: {e}"),
            })?;

        if reader.format().is_none() {
            return Err(PipelineError::UnsupportedFormat {
                name: source.name.clone(),
                format: source.mime_type.clone(),
            });
        }

        let image = reader.decode().map_err(|e| PipelineError::Decode {
            name: source.name.clone(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                name: source.name.clone(),
                width,
                height,
                max_dim,
            });
        }

        let (out_w, out_h) = resolve_dimensions(width, height, profile.max_width, profile.max_height);
        let image = if (out_w, out_h) != (width, height) {
            tracing::debug!(
                name = %source.name,
                from = format!("{width}x{height}"),
                to = format!("{out_w}x{out_h}"),
                "scaling down"
            );
            image.resize_exact(out_w, out_h, FilterType::Lanczos3)
        } else {
            image
        };

        let bytes = match profile.output_format {
            OutputFormat::Jpeg => Self::encode_jpeg_within_budget(source, &image, profile)?,
            OutputFormat::Png => Self::encode_png(source, &image)?,
            OutputFormat::WebP => Self::encode_webp(source, &image)?,
        };

        let byte_size = bytes.len() as u64;
        Ok(CompressedArtifact {
            bytes,
            byte_size,
            format: profile.output_format,
            width: out_w,
            height: out_h,
        })
    }

    /// JPEG encode, stepping quality down until the byte budget is met or
    /// the quality floor is reached. Any Exif block from the source is
    /// carried into the output unchanged.
    fn encode_jpeg_within_budget(
        source: &SourceImage,
        image: &DynamicImage,
        profile: &CompressionProfile,
    ) -> PipelineResult<Vec<u8>> {
        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let budget = profile.size_budget();

        let mut quality = profile.quality.clamp(QUALITY_FLOOR, 100);
        let mut bytes = Self::encode_jpeg(source, &rgb, quality)?;
        while bytes.len() as u64 > budget && quality > QUALITY_FLOOR {
            quality = quality.saturating_sub(QUALITY_STEP).max(QUALITY_FLOOR);
            tracing::debug!(name = %source.name, quality, "over budget, stepping quality down");
            bytes = Self::encode_jpeg(source, &rgb, quality)?;
        }
        if bytes.len() as u64 > budget {
            tracing::warn!(
                name = %source.name,
                size = bytes.len(),
                budget,
                "byte budget not reachable at minimum quality"
            );
        }

        let prefix = &source.bytes[..source.bytes.len().min(metadata::SCAN_PREFIX_LEN)];
        if let Some(with_exif) = metadata::carry_exif(prefix, &bytes) {
            bytes = with_exif;
        }
        Ok(bytes)
    }

    fn encode_jpeg(
        source: &SourceImage,
        image: &DynamicImage,
        quality: u8,
    ) -> PipelineResult<Vec<u8>> {
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, quality);
        image
            .write_with_encoder(encoder)
            .map_err(|e| PipelineError::Compression {
                name: source.name.clone(),
                message: e.to_string(),
            })?;
        Ok(out)
    }

    /// PNG is lossless; quality and byte budget are advisory only.
    fn encode_png(source: &SourceImage, image: &DynamicImage) -> PipelineResult<Vec<u8>> {
        let mut out = Vec::new();
        image
            .write_with_encoder(PngEncoder::new(&mut out))
            .map_err(|e| PipelineError::Compression {
                name: source.name.clone(),
                message: e.to_string(),
            })?;
        Ok(out)
    }

    /// WebP output is lossless in this encoder; quality is advisory only.
    fn encode_webp(source: &SourceImage, image: &DynamicImage) -> PipelineResult<Vec<u8>> {
        let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
        let mut out = Vec::new();
        rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))
            .map_err(|e| PipelineError::Compression {
                name: source.name.clone(),
                message: e.to_string(),
            })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use image::RgbImage;

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(PngEncoder::new(&mut out))
            .unwrap();
        out
    }

    fn source(name: &str, bytes: Vec<u8>) -> Arc<SourceImage> {
        Arc::new(SourceImage::new(name, bytes, "image/png", Utc::now()))
    }

    fn engine() -> CompressionEngine {
        CompressionEngine::new(LimitsConfig::default())
    }

    #[tokio::test]
    async fn test_compress_to_jpeg() {
        let src = source("a.png", gradient_png(64, 48));
        let profile = CompressionProfile::new(85, 2400, 1600, None, OutputFormat::Jpeg);

        let artifact = engine().compress(src, profile).await.unwrap();
        assert_eq!(artifact.format, OutputFormat::Jpeg);
        assert_eq!((artifact.width, artifact.height), (64, 48));
        assert!(artifact.bytes.starts_with(&[0xFF, 0xD8]));
        assert_eq!(artifact.byte_size, artifact.bytes.len() as u64);
    }

    #[tokio::test]
    async fn test_oversized_dimensions_scaled_down() {
        let src = source("big.png", gradient_png(480, 320));
        let profile = CompressionProfile::new(85, 240, 160, None, OutputFormat::Jpeg);

        let artifact = engine().compress(src, profile).await.unwrap();
        assert_eq!((artifact.width, artifact.height), (240, 160));
    }

    #[tokio::test]
    async fn test_small_image_not_upscaled() {
        let src = source("small.png", gradient_png(10, 10));
        let profile = CompressionProfile::new(85, 2400, 1600, None, OutputFormat::Png);

        let artifact = engine().compress(src, profile).await.unwrap();
        assert_eq!((artifact.width, artifact.height), (10, 10));
    }

    #[tokio::test]
    async fn test_garbage_input_fails_decode() {
        let src = source("bad.png", b"definitely not an image".to_vec());
        let err = engine()
            .compress(src, CompressionProfile::default())
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                PipelineError::Decode { .. } | PipelineError::UnsupportedFormat { .. }
            ),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_file_size_limit_rejected_before_decode() {
        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..Default::default()
        };
        let src = source("huge.png", vec![0u8; 2 * 1024 * 1024]);
        let err = CompressionEngine::new(limits)
            .compress(src, CompressionProfile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::FileTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_dimension_limit_rejected_after_decode() {
        let limits = LimitsConfig {
            max_image_dimension: 100,
            ..Default::default()
        };
        let src = source("wide.png", gradient_png(200, 50));
        let err = CompressionEngine::new(limits)
            .compress(src, CompressionProfile::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ImageTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_budget_steps_quality_down() {
        // A busy gradient at quality 100 easily exceeds a tiny budget; the
        // loop must produce something smaller than the unconstrained encode
        let bytes = gradient_png(256, 256);

        let unconstrained = engine()
            .compress(
                source("a.png", bytes.clone()),
                CompressionProfile::new(100, 2400, 1600, None, OutputFormat::Jpeg),
            )
            .await
            .unwrap();

        let budget = unconstrained.byte_size / 2;
        let constrained = engine()
            .compress(
                source("a.png", bytes),
                CompressionProfile::new(100, 2400, 1600, Some(budget), OutputFormat::Jpeg),
            )
            .await
            .unwrap();

        assert!(constrained.byte_size < unconstrained.byte_size);
    }

    #[tokio::test]
    async fn test_jpeg_source_exif_carried_over() {
        use crate::types::GeoPoint;

        // Compress a JPEG that already carries GPS; the artifact keeps it
        let base = engine()
            .compress(
                source("seed.png", gradient_png(32, 32)),
                CompressionProfile::new(85, 2400, 1600, None, OutputFormat::Jpeg),
            )
            .await
            .unwrap();
        let located = metadata::LocationSyncWriter::apply_location(
            "seed.jpg",
            &base,
            GeoPoint {
                latitude: 40.7128,
                longitude: -74.006,
            },
        )
        .unwrap();

        let src = Arc::new(SourceImage::new(
            "seed.jpg",
            located.bytes,
            "image/jpeg",
            Utc::now(),
        ));
        let artifact = engine()
            .compress(src, CompressionProfile::new(85, 2400, 1600, None, OutputFormat::Jpeg))
            .await
            .unwrap();

        let meta = metadata::MetadataExtractor::extract(&artifact.bytes);
        let loc = meta.location.expect("GPS should survive recompression");
        assert!((loc.latitude - 40.7128).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_compress_to_webp() {
        let src = source("a.png", gradient_png(20, 20));
        let profile = CompressionProfile::new(85, 2400, 1600, None, OutputFormat::WebP);

        let artifact = engine().compress(src, profile).await.unwrap();
        assert_eq!(artifact.format, OutputFormat::WebP);
        assert_eq!(&artifact.bytes[0..4], b"RIFF");
        assert_eq!(&artifact.bytes[8..12], b"WEBP");
    }
}
