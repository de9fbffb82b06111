//! Geopress CLI - batch photo compression with GPS location sync.
//!
//! Geopress compresses a set of photos and, when a reference set with GPS
//! data is supplied, writes the temporally closest reference coordinate
//! into each compressed output.
//!
//! # Usage
//!
//! ```bash
//! # Compress a directory
//! geopress process ./photos/ --out ./compressed/
//!
//! # Compress and sync locations from phone photos
//! geopress process ./camera/ --reference ./phone/ --out ./compressed/
//!
//! # Use a preset
//! geopress process ./photos/ --preset web --out ./compressed/
//!
//! # View configuration
//! geopress config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Geopress - batch photo compression with GPS location sync.
#[derive(Parser, Debug)]
#[command(name = "geopress")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compress photos, optionally syncing GPS from a reference set
    Process(cli::process::ProcessArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match geopress_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `geopress config path`."
            );
            geopress_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Geopress v{}", geopress_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
