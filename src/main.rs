//! # Sanctions Watch CLI (`sw`)
//!
//! The `sw` binary drives the ingestion pipeline: crawl the configured
//! sanctions lists, validate a configuration against live or mock
//! payloads, and inspect source health.
//!
//! ## Usage
//!
//! ```bash
//! sw --config ./watch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sw crawl` | Fetch, normalize, match, and build the registry |
//! | `sw validate` | Run the pipeline and report without exporting |
//! | `sw sources` | List configured sources and their health |
//!
//! ## Examples
//!
//! ```bash
//! # Full crawl of every configured source
//! sw crawl --config ./watch.toml
//!
//! # Crawl two sources against local fixture payloads
//! sw crawl --source ofac --source un --mock-dir ./fixtures --config ./watch.toml
//!
//! # Export merged profiles as CSV
//! sw crawl --output profiles.csv --format csv --config ./watch.toml
//!
//! # Check what a crawl would ingest
//! sw validate --config ./watch.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sanctions_watch::export::ExportFormat;
use sanctions_watch::{config, pipeline, sources};

/// Sanctions Watch CLI: sanctions-list ingestion and entity resolution.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file listing the sources to crawl and the matching thresholds.
#[derive(Parser)]
#[command(
    name = "sw",
    about = "Sanctions Watch: sanctions-list ingestion and entity resolution",
    version,
    long_about = "Sanctions Watch fetches the major public sanctions lists (OFAC SDN, UN \
    consolidated, EU consolidated, UK OFSI), normalizes their records, links listings that \
    denote the same real-world entity across lists, and exports merged profiles."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./watch.toml`. Source URLs, rate limits, retry
    /// behavior, and matching thresholds are all read from this file.
    #[arg(long, global = true, default_value = "./watch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Crawl the configured sources and build the entity registry.
    ///
    /// Fetches every selected source concurrently (with per-source
    /// retry and rate limiting), normalizes the records, links entities
    /// across sources, and prints a per-source report. Exits zero as
    /// long as at least one source produced records.
    Crawl {
        /// Only crawl this source; repeat for several. Default: all
        /// configured sources.
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Read payloads from `<dir>/<source>.{xml,csv}` instead of the
        /// configured URLs. For offline runs and fixtures.
        #[arg(long)]
        mock_dir: Option<PathBuf>,

        /// Override every source's minimum request spacing, in seconds.
        #[arg(long)]
        rate_limit: Option<f64>,

        /// Write the merged profiles to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Export format for --output.
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
    },

    /// Run the pipeline and report, without exporting.
    ///
    /// Same fetch/parse/match path as `crawl`; prints per-source record
    /// counts, parse failures, and unresolved review flags.
    Validate {
        /// Only validate this source; repeat for several.
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Read payloads from `<dir>/<source>.{xml,csv}` instead of the
        /// configured URLs.
        #[arg(long)]
        mock_dir: Option<PathBuf>,
    },

    /// List configured sources and their health.
    ///
    /// Checks mock file presence and URL shape without fetching
    /// anything. Useful for verifying configuration before a crawl.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sanctions_watch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Crawl {
            sources,
            mock_dir,
            rate_limit,
            output,
            format,
        } => {
            pipeline::apply_overrides(&mut cfg, mock_dir.as_deref(), rate_limit);
            pipeline::run_crawl(&cfg, &sources, format, output.as_deref()).await?;
        }
        Commands::Validate { sources, mock_dir } => {
            pipeline::apply_overrides(&mut cfg, mock_dir.as_deref(), None);
            pipeline::run_validate(&cfg, &sources).await?;
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
    }

    Ok(())
}
