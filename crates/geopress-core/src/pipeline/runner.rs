//! Run orchestration: wires compression, matching and location sync
//! together over the batch scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{GeopressError, PipelineError, PipelineResult, Result};
use crate::events::{LogSeverity, RunObserver};
use crate::metadata::{LocationSyncWriter, MetadataExtractor};
use crate::profile::CompressionProfile;
use crate::types::{MatchResult, ProcessedRecord, RunStats, SourceImage};

use super::compress::CompressionEngine;
use super::matcher::{ReferenceRecord, TemporalMatcher};
use super::scheduler::{BatchScheduler, CancelToken};

/// What a run does with the reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Compress the primary set only
    CompressOnly,
    /// Compress, then write matched reference coordinates into the outputs
    CompressAndSync,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    /// One record per successful primary item, in input order
    pub records: Vec<ProcessedRecord>,
    /// Reference pairings that were written into an output
    pub matches: Vec<MatchResult>,
    pub stats: RunStats,
}

/// Per-item output of a pipeline worker.
struct WorkerOutput {
    artifact: crate::types::CompressedArtifact,
    location_synced: bool,
    matched: Option<MatchResult>,
}

/// The top-level pipeline. Cheap to clone; per-run state lives on the
/// stack of [`PipelineRunner::run`].
#[derive(Clone)]
pub struct PipelineRunner {
    config: Config,
    engine: Arc<CompressionEngine>,
}

impl PipelineRunner {
    pub fn new(config: Config) -> Self {
        let engine = Arc::new(CompressionEngine::new(config.limits.clone()));
        Self { config, engine }
    }

    /// Execute one run to completion.
    ///
    /// Reference extraction happens first (and only in sync mode); the
    /// primary set is then processed in batches. Per-item failures are
    /// isolated into [`RunStats::failed`]; the only run-level failure is
    /// the reference phase itself.
    pub async fn run(
        &self,
        primary: Vec<Arc<SourceImage>>,
        reference: Vec<Arc<SourceImage>>,
        profile: CompressionProfile,
        mode: RunMode,
        observer: Arc<dyn RunObserver>,
        cancel: CancelToken,
    ) -> Result<RunReport> {
        let total = primary.len();
        tracing::info!(total, mode = ?mode, "starting run");

        let references = if mode == RunMode::CompressAndSync {
            let refs = tokio::task::spawn_blocking(move || Self::build_references(&reference))
                .await
                .map_err(|e| PipelineError::ReferencePhase(e.to_string()))?;
            tracing::info!(usable = refs.len(), "reference phase complete");
            if refs.is_empty() {
                observer.on_log(
                    LogSeverity::Info,
                    "no usable reference locations; nothing will be synced",
                );
            }
            Arc::new(refs)
        } else {
            Arc::new(Vec::new())
        };

        let scheduler = BatchScheduler::new(
            self.config.processing.batch_size,
            Duration::from_millis(self.config.processing.batch_pause_ms),
        );

        let sources = primary.clone();
        let processed = Arc::new(AtomicUsize::new(0));

        let worker = {
            let engine = Arc::clone(&self.engine);
            let observer = Arc::clone(&observer);
            let references = Arc::clone(&references);
            let processed = Arc::clone(&processed);
            let profile = profile.clone();
            move |_index: usize, source: Arc<SourceImage>| {
                let engine = Arc::clone(&engine);
                let observer = Arc::clone(&observer);
                let references = Arc::clone(&references);
                let processed = Arc::clone(&processed);
                let profile = profile.clone();
                async move {
                    let result =
                        Self::process_item(engine, Arc::clone(&source), profile, &references).await;

                    let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    observer.on_progress(done, total, &source.name);
                    match &result {
                        Ok(output) => {
                            let note = if output.location_synced {
                                " (location synced)"
                            } else {
                                ""
                            };
                            observer.on_log(
                                LogSeverity::Success,
                                &format!(
                                    "{}: {} -> {} bytes{note}",
                                    source.name, source.byte_size, output.artifact.byte_size
                                ),
                            );
                        }
                        Err(e) => {
                            observer.on_log(LogSeverity::Error, &format!("{}: {e}", source.name));
                        }
                    }
                    result
                }
            }
        };

        let outcomes = scheduler.run_batches(primary, &cancel, worker).await;

        let mut stats = RunStats {
            attempted: outcomes.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(stats.attempted);
        let mut matches = Vec::new();

        for outcome in outcomes {
            let source = Arc::clone(&sources[outcome.index]);
            match outcome.result {
                Ok(output) => {
                    stats.succeeded += 1;
                    stats.bytes_before += source.byte_size;
                    stats.bytes_after += output.artifact.byte_size;
                    if output.location_synced {
                        stats.synced += 1;
                    }
                    let matched_reference =
                        output.matched.as_ref().map(|m| m.reference_name.clone());
                    if let Some(m) = output.matched {
                        matches.push(m);
                    }
                    records.push(ProcessedRecord {
                        source,
                        artifact: output.artifact,
                        location_synced: output.location_synced,
                        matched_reference,
                    });
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(name = %source.name, "item failed: {e}");
                }
            }
        }

        tracing::info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            synced = stats.synced,
            ratio = stats.compression_ratio_percent(),
            "run complete"
        );
        observer.on_log(
            LogSeverity::Info,
            &format!(
                "run complete: {}/{} items, {} synced, {}% saved",
                stats.succeeded,
                stats.attempted,
                stats.synced,
                stats.compression_ratio_percent()
            ),
        );

        Ok(RunReport {
            records,
            matches,
            stats,
        })
    }

    /// Start a run on the current runtime, returning a handle that can
    /// cancel it or wait for the report.
    pub fn submit(
        &self,
        primary: Vec<Arc<SourceImage>>,
        reference: Vec<Arc<SourceImage>>,
        profile: CompressionProfile,
        mode: RunMode,
        observer: Arc<dyn RunObserver>,
    ) -> RunHandle {
        let cancel = CancelToken::new();
        let runner = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            runner
                .run(primary, reference, profile, mode, observer, token)
                .await
        });
        RunHandle { cancel, handle }
    }

    async fn process_item(
        engine: Arc<CompressionEngine>,
        source: Arc<SourceImage>,
        profile: CompressionProfile,
        references: &[ReferenceRecord],
    ) -> PipelineResult<WorkerOutput> {
        let artifact = engine.compress(Arc::clone(&source), profile).await?;

        if references.is_empty() {
            return Ok(WorkerOutput {
                artifact,
                location_synced: false,
                matched: None,
            });
        }

        let meta = MetadataExtractor::extract(&source.bytes);
        let timestamp = meta.timestamp.unwrap_or(source.modified_at);
        let Some((reference, delta_ms)) = TemporalMatcher::find_closest(timestamp, references)
        else {
            tracing::debug!(name = %source.name, "no reference within the match window");
            return Ok(WorkerOutput {
                artifact,
                location_synced: false,
                matched: None,
            });
        };

        match LocationSyncWriter::apply_location(&source.name, &artifact, reference.location) {
            Ok(synced) => Ok(WorkerOutput {
                artifact: synced,
                location_synced: true,
                matched: Some(MatchResult {
                    primary_name: source.name.clone(),
                    reference_name: reference.filename.clone(),
                    delta_ms,
                }),
            }),
            Err(e) => {
                // No writable metadata slot; keep the artifact unsynced
                tracing::warn!(name = %source.name, "{e}");
                Ok(WorkerOutput {
                    artifact,
                    location_synced: false,
                    matched: None,
                })
            }
        }
    }

    /// Extract reference metadata, keeping only items with a decodable
    /// coordinate. Sorted by filename so matching is deterministic.
    fn build_references(reference: &[Arc<SourceImage>]) -> Vec<ReferenceRecord> {
        let mut sorted: Vec<_> = reference.to_vec();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        let mut records = Vec::new();
        for item in sorted {
            let meta = MetadataExtractor::extract(&item.bytes);
            match meta.location {
                Some(location) => records.push(ReferenceRecord {
                    filename: item.name.clone(),
                    timestamp: meta.timestamp.unwrap_or(item.modified_at),
                    location,
                }),
                None => {
                    tracing::debug!(name = %item.name, "reference item has no location, skipping")
                }
            }
        }
        records
    }
}

/// Handle to a run started with [`PipelineRunner::submit`].
pub struct RunHandle {
    cancel: CancelToken,
    handle: JoinHandle<Result<RunReport>>,
}

impl RunHandle {
    /// Request cancellation; the run stops at the next batch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish and return its report.
    pub async fn wait(self) -> Result<RunReport> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(GeopressError::Pipeline(PipelineError::Task {
                message: e.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::profile::OutputFormat;
    use crate::types::GeoPoint;
    use chrono::{TimeZone, Utc};
    use image::codecs::png::PngEncoder;
    use image::{DynamicImage, RgbImage};
    use std::sync::Mutex;

    struct CollectingObserver {
        logs: Mutex<Vec<(LogSeverity, String)>>,
        progress: Mutex<Vec<usize>>,
    }

    impl CollectingObserver {
        fn new() -> Self {
            Self {
                logs: Mutex::new(Vec::new()),
                progress: Mutex::new(Vec::new()),
            }
        }
    }

    impl RunObserver for CollectingObserver {
        fn on_progress(&self, processed: usize, _total: usize, _current_item: &str) {
            self.progress.lock().unwrap().push(processed);
        }

        fn on_log(&self, severity: LogSeverity, message: &str) {
            self.logs
                .lock()
                .unwrap()
                .push((severity, message.to_string()));
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(PngEncoder::new(&mut out))
            .unwrap();
        out
    }

    fn noon() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn primary_item(name: &str) -> Arc<SourceImage> {
        Arc::new(SourceImage::new(name, png_bytes(24, 24), "image/png", noon()))
    }

    /// Build a JPEG reference image carrying a GPS coordinate.
    async fn located_reference(name: &str, point: GeoPoint) -> Arc<SourceImage> {
        let engine = CompressionEngine::new(crate::config::LimitsConfig::default());
        let artifact = engine
            .compress(
                primary_item("seed.png"),
                CompressionProfile::new(85, 100, 100, None, OutputFormat::Jpeg),
            )
            .await
            .unwrap();
        let located = LocationSyncWriter::apply_location(name, &artifact, point).unwrap();
        Arc::new(SourceImage::new(name, located.bytes, "image/jpeg", noon()))
    }

    fn jpeg_profile() -> CompressionProfile {
        CompressionProfile::new(85, 100, 100, None, OutputFormat::Jpeg)
    }

    fn runner() -> PipelineRunner {
        PipelineRunner::new(Config::default())
    }

    #[tokio::test]
    async fn test_compress_only_run() {
        let primary = vec![primary_item("a.png"), primary_item("b.png")];
        let observer = Arc::new(CollectingObserver::new());

        let report = runner()
            .run(
                primary,
                vec![],
                jpeg_profile(),
                RunMode::CompressOnly,
                observer.clone(),
                CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.synced, 0);
        assert!(report.records.iter().all(|r| !r.location_synced));
        assert!(report.matches.is_empty());

        // Progress reached the total
        assert_eq!(*observer.progress.lock().unwrap().last().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_run_writes_matched_location() {
        let point = GeoPoint {
            latitude: 48.8584,
            longitude: 2.2945,
        };
        let reference = vec![located_reference("ref.jpg", point).await];
        let primary = vec![primary_item("a.png")];

        let report = runner()
            .run(
                primary,
                reference,
                jpeg_profile(),
                RunMode::CompressAndSync,
                Arc::new(NullObserver),
                CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.stats.synced, 1);
        let record = &report.records[0];
        assert!(record.location_synced);
        assert_eq!(record.matched_reference.as_deref(), Some("ref.jpg"));
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].primary_name, "a.png");

        let loc = MetadataExtractor::extract(&record.artifact.bytes)
            .location
            .expect("output should carry the reference GPS");
        assert!((loc.latitude - 48.8584).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_sync_run_with_empty_reference_set() {
        // Sync mode with no usable references: everything compresses,
        // nothing syncs, no error
        let primary = vec![primary_item("a.png"), primary_item("b.png")];

        let report = runner()
            .run(
                primary,
                vec![],
                jpeg_profile(),
                RunMode::CompressAndSync,
                Arc::new(NullObserver),
                CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.synced, 0);
        assert!(report.records.iter().all(|r| !r.location_synced));
    }

    #[tokio::test]
    async fn test_non_jpeg_output_stays_unsynced() {
        // PNG output has no writable metadata slot; the item still succeeds
        let point = GeoPoint {
            latitude: 1.0,
            longitude: 2.0,
        };
        let reference = vec![located_reference("ref.jpg", point).await];
        let primary = vec![primary_item("a.png")];
        let profile = CompressionProfile::new(85, 100, 100, None, OutputFormat::Png);

        let report = runner()
            .run(
                primary,
                reference,
                profile,
                RunMode::CompressAndSync,
                Arc::new(NullObserver),
                CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.stats.synced, 0);
        assert!(!report.records[0].location_synced);
    }

    #[tokio::test]
    async fn test_failed_item_is_isolated() {
        let primary = vec![
            primary_item("good1.png"),
            Arc::new(SourceImage::new(
                "broken.png",
                b"not an image".to_vec(),
                "image/png",
                noon(),
            )),
            primary_item("good2.png"),
        ];
        let observer = Arc::new(CollectingObserver::new());

        let report = runner()
            .run(
                primary,
                vec![],
                jpeg_profile(),
                RunMode::CompressOnly,
                observer.clone(),
                CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.stats.attempted, 3);
        assert_eq!(report.stats.succeeded, 2);
        assert_eq!(report.stats.failed, 1);

        // Records keep input order, with the failed item absent
        let names: Vec<&str> = report.records.iter().map(|r| r.source.name.as_str()).collect();
        assert_eq!(names, vec!["good1.png", "good2.png"]);

        let errors = observer
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == LogSeverity::Error)
            .count();
        assert_eq!(errors, 1);
    }

    #[tokio::test]
    async fn test_stats_count_successes_only() {
        let primary = vec![
            primary_item("a.png"),
            Arc::new(SourceImage::new(
                "broken.png",
                b"junk".to_vec(),
                "image/png",
                noon(),
            )),
        ];

        let report = runner()
            .run(
                primary.clone(),
                vec![],
                jpeg_profile(),
                RunMode::CompressOnly,
                Arc::new(NullObserver),
                CancelToken::new(),
            )
            .await
            .unwrap();

        // The broken item contributes to neither byte tally
        assert_eq!(report.stats.bytes_before, primary[0].byte_size);
        assert_eq!(
            report.stats.bytes_after,
            report.records[0].artifact.byte_size
        );
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let primary = vec![primary_item("a.png")];
        let handle = runner().submit(
            primary,
            vec![],
            jpeg_profile(),
            RunMode::CompressOnly,
            Arc::new(NullObserver),
        );
        let report = handle.wait().await.unwrap();
        assert_eq!(report.stats.succeeded, 1);
    }

    #[tokio::test]
    async fn test_submitted_run_can_be_cancelled() {
        // Enough items for several batches; cancel immediately so later
        // batches never start
        let primary: Vec<_> = (0..20)
            .map(|i| primary_item(&format!("img{i:02}.png")))
            .collect();
        let handle = runner().submit(
            primary,
            vec![],
            jpeg_profile(),
            RunMode::CompressOnly,
            Arc::new(NullObserver),
        );
        handle.cancel();
        let report = handle.wait().await.unwrap();
        assert!(report.stats.attempted < 20);
    }
}
