//! The `geopress process` command: compress photos and sync locations.

mod observer;
mod preset;

pub use preset::Preset;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use geopress_core::pipeline::{load_source, CancelToken, FileDiscovery, PipelineRunner};
use geopress_core::{
    export_name, CompressionProfile, Config, MatchResult, NamingPolicy, OutputFormat,
    ProcessedRecord, RecordSummary, RunMode, RunReport, RunStats, SourceImage,
};

use observer::ProgressObserver;

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Photo file or directory to compress
    #[arg(required = true)]
    pub input: PathBuf,

    /// Reference photos carrying GPS data; enables location sync
    #[arg(short, long)]
    pub reference: Option<PathBuf>,

    /// Output directory for compressed files
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Profile preset (overridden by the explicit options below)
    #[arg(short, long, value_enum)]
    pub preset: Option<Preset>,

    /// Encoder quality, 0-100
    #[arg(short, long)]
    pub quality: Option<u8>,

    /// Maximum output width in pixels
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Maximum output height in pixels
    #[arg(long)]
    pub max_height: Option<u32>,

    /// Byte budget per output in kilobytes
    #[arg(long)]
    pub target_size_kb: Option<u64>,

    /// Output format: jpeg, png or webp
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// How exported files are named: original, suffix, prefix, folder, parent-folder
    #[arg(long, default_value = "suffix")]
    pub naming: NamingPolicy,

    /// Items processed concurrently per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(batch_size) = args.batch_size {
        config.processing.batch_size = batch_size;
    }
    let profile = build_profile(&args, &config);

    let discovery = FileDiscovery::new(config.processing.clone());
    let primary_files = discovery.discover(&args.input);
    if primary_files.is_empty() {
        tracing::warn!("No supported photo files found at {:?}", args.input);
        return Ok(());
    }
    tracing::info!("Found {} photo(s) to compress", primary_files.len());

    let mut primary = Vec::with_capacity(primary_files.len());
    for file in &primary_files {
        primary.push(load_source(file).await?);
    }

    let (reference, mode) = match &args.reference {
        Some(path) => {
            let reference = load_reference_set(&discovery, path).await?;
            (reference, RunMode::CompressAndSync)
        }
        None => (Vec::new(), RunMode::CompressOnly),
    };

    let observer = Arc::new(ProgressObserver::new(primary.len() as u64));
    let runner = PipelineRunner::new(config);
    let start = std::time::Instant::now();

    let report = runner
        .run(
            primary,
            reference,
            profile,
            mode,
            observer.clone(),
            CancelToken::new(),
        )
        .await?;
    observer.finish();

    export_records(&report.records, &args.out, args.naming)?;
    if let Some(report_path) = &args.report {
        write_report(report_path, &report)?;
        tracing::info!("Report written to {:?}", report_path);
    }

    print_summary(&report.stats, start.elapsed());
    Ok(())
}

/// Resolve the run profile: preset or config defaults, then explicit flags.
fn build_profile(args: &ProcessArgs, config: &Config) -> CompressionProfile {
    let mut profile = match args.preset {
        Some(preset) => preset.profile(),
        None => config.default_profile(),
    };

    if let Some(quality) = args.quality {
        profile.quality = quality.min(100);
    }
    if let Some(max_width) = args.max_width {
        profile.max_width = max_width.max(1);
    }
    if let Some(max_height) = args.max_height {
        profile.max_height = max_height.max(1);
    }
    if let Some(kb) = args.target_size_kb {
        profile.target_size_bytes = Some(kb * 1024);
    }
    if let Some(format) = args.format {
        profile.output_format = format;
    }
    profile
}

/// Discover and load the reference set.
async fn load_reference_set(
    discovery: &FileDiscovery,
    path: &Path,
) -> anyhow::Result<Vec<Arc<SourceImage>>> {
    let files = discovery.discover(path);
    if files.is_empty() {
        tracing::warn!("No supported reference photos found at {path:?}");
    } else {
        tracing::info!("Found {} reference photo(s)", files.len());
    }

    let mut reference = Vec::with_capacity(files.len());
    for file in &files {
        reference.push(load_source(file).await?);
    }
    Ok(reference)
}

/// Write every record under the output directory using the naming policy.
/// The extension always follows the output format.
fn export_records(
    records: &[ProcessedRecord],
    out_dir: &Path,
    policy: NamingPolicy,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)?;

    for record in records {
        let name = export_name(&record.source.name, policy);
        let path = out_dir
            .join(name)
            .with_extension(record.artifact.format.extension());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &record.artifact.bytes)?;
        tracing::debug!("wrote {:?}", path);
    }
    Ok(())
}

/// Serializable run report for `--report`.
#[derive(serde::Serialize)]
struct JsonReport<'a> {
    stats: &'a RunStats,
    matches: &'a [MatchResult],
    records: Vec<RecordSummary>,
}

fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    let json = JsonReport {
        stats: &report.stats,
        matches: &report.matches,
        records: report.records.iter().map(|r| r.summary()).collect(),
    };
    std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
    Ok(())
}

/// Print a formatted summary table after a run.
fn print_summary(stats: &RunStats, elapsed: std::time::Duration) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", stats.succeeded);
    if stats.failed > 0 {
        eprintln!("    Failed:       {:>8}", stats.failed);
    }
    if stats.synced > 0 {
        eprintln!("    Synced:       {:>8}", stats.synced);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", stats.attempted);
    eprintln!(
        "    Saved:        {:>7}%",
        stats.compression_ratio_percent()
    );
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}
