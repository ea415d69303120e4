//! Command-line interface for `civicetl`.
//!
//! This binary keeps a local mirror of Boston civic datasets up to date. It
//! parses arguments with [`clap`], configures logging with [`tracing`], and
//! delegates the work to [`civicetl_core`].
//!
//! # Available Commands
//!
//! - `fetch-311` - Download any missing year of 311 service requests
//! - `prepare-geo` - Convert zipped shapefiles to GeoParquet
//! - `all` - Run `fetch-311` then `prepare-geo`
//! - `sources` - List every registered dataset
//! - `info` - Display the schema of a local CSV or GeoParquet file
//!
//! Batch commands keep going when one item fails and exit with status 1 once
//! the whole batch has run.

mod display;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use tracing::{Level, debug, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use civicetl_core::download::{DownloadOptions, Downloader, HttpDownloader};
use civicetl_core::error::CivicEtlError;
use civicetl_core::info::inspect_dataset;
use civicetl_core::layout::{DEFAULT_PROCESSED_DIR, DEFAULT_RAW_DIR, DataLayout};
use civicetl_core::prepare::prepare_all;
use civicetl_core::sources::{GeoTask, TabularSource, find_resource, geo_tasks, tabular_sources};
use civicetl_core::tabular::fetch_tabular;

#[derive(Parser)]
#[command(
    name = "civicetl",
    version,
    about = "Keep a local mirror of Boston civic data",
    long_about = "civicetl downloads Boston 311 service requests year by year and converts \
                  civic boundary shapefiles to GeoParquet.\n\
                  Files that are already present locally are never downloaded again."
)]
/// Command-line arguments and options for the `civicetl` CLI.
struct Cli {
    /// Enable verbose (DEBUG level) logging output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory for downloads and scratch space.
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "CIVICETL_RAW_DIR",
        default_value = DEFAULT_RAW_DIR
    )]
    raw_dir: PathBuf,

    /// Directory for GeoParquet outputs.
    #[arg(
        long,
        global = true,
        value_name = "DIR",
        env = "CIVICETL_PROCESSED_DIR",
        default_value = DEFAULT_PROCESSED_DIR
    )]
    processed_dir: PathBuf,

    /// Verify server TLS certificates.
    #[arg(long, global = true)]
    verify_tls: bool,

    /// Do not draw download progress bars.
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `civicetl` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Downloads every missing year of Boston 311 service requests.
    ///
    /// Years with a non-empty local file are skipped without any request.
    #[command(name = "fetch-311")]
    Fetch311 {
        /// Restrict the run to these years (repeatable).
        #[arg(long = "year", value_name = "YEAR")]
        years: Vec<u16>,
    },

    /// Converts the registered shapefile archives to GeoParquet.
    ///
    /// Outputs that already exist are left untouched.
    PrepareGeo {
        /// Only prepare the output with this name.
        #[arg(long, value_name = "NAME")]
        only: Option<String>,
    },

    /// Runs `fetch-311` and then `prepare-geo`.
    All,

    /// Lists every registered dataset.
    Sources,

    /// Displays the schema of a local CSV or GeoParquet file.
    Info {
        /// Path to the dataset.
        #[arg(value_name = "DATASET")]
        input: PathBuf,
    },
}

/// Entry point for the `civicetl` command-line interface.
///
/// # Errors
///
/// Returns an error if logging cannot be initialized or a single-item command
/// fails. Batch failures are reported through the exit code instead.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let layout = DataLayout::new(&cli.raw_dir, &cli.processed_dir);
    debug!(
        "Raw directory: {}, processed directory: {}",
        layout.raw_dir().display(),
        layout.processed_dir().display()
    );
    let options = DownloadOptions {
        verify_tls: cli.verify_tls,
        show_progress: !cli.no_progress,
    };

    let success = match cli.command {
        Commands::Fetch311 { years } => {
            let sources = select_years(&years)?;
            let downloader = http_downloader(options)?;
            handle_fetch(&layout, &sources, &downloader).await?
        },
        Commands::PrepareGeo { only } => {
            let tasks = select_tasks(only.as_deref())?;
            let downloader = http_downloader(options)?;
            handle_prepare(&layout, &tasks, &downloader).await
        },
        Commands::All => {
            let downloader = http_downloader(options)?;
            let fetched = handle_fetch(&layout, &tabular_sources(), &downloader).await?;
            let prepared = handle_prepare(&layout, &geo_tasks(), &downloader).await;
            fetched && prepared
        },
        Commands::Sources => {
            display::display_sources();
            true
        },
        Commands::Info { input } => {
            info!("Displaying info for {}", input.display());
            let dataset = inspect_dataset(&input).await.map_err(|e| user_error(&e))?;
            display::display_dataset_info(&dataset);
            true
        },
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn http_downloader(options: DownloadOptions) -> Result<HttpDownloader> {
    HttpDownloader::new(options).map_err(|e| user_error(&e))
}

async fn handle_fetch(
    layout: &DataLayout,
    sources: &[TabularSource],
    downloader: &dyn Downloader,
) -> Result<bool> {
    let report = fetch_tabular(layout, sources, downloader)
        .await
        .map_err(|e| user_error(&e))?;
    display::display_fetch_report(&report);
    info!(
        "311 data: {} downloaded, {} failed",
        report.downloaded(),
        report.failures().count()
    );
    Ok(report.is_success())
}

async fn handle_prepare(
    layout: &DataLayout,
    tasks: &[GeoTask],
    downloader: &dyn Downloader,
) -> bool {
    let report = prepare_all(layout, tasks, downloader).await;
    display::display_prepare_report(&report);
    info!(
        "Geospatial data: {} written, {} failed",
        report.written(),
        report.failures().count()
    );
    report.is_success()
}

/// Registered sources for `years`, or all of them when `years` is empty.
fn select_years(years: &[u16]) -> Result<Vec<TabularSource>> {
    let all = tabular_sources();
    if years.is_empty() {
        return Ok(all);
    }
    let unknown: Vec<String> = years
        .iter()
        .filter(|y| !all.iter().any(|s| s.year == **y))
        .map(ToString::to_string)
        .collect();
    if !unknown.is_empty() {
        let available: Vec<String> = all.iter().map(|s| s.year.to_string()).collect();
        bail!(
            "No 311 data registered for {}. Available years: {}",
            unknown.join(", "),
            available.join(", ")
        );
    }
    Ok(all.into_iter().filter(|s| years.contains(&s.year)).collect())
}

fn select_tasks(only: Option<&str>) -> Result<Vec<GeoTask>> {
    match only {
        Some(name) => Ok(vec![find_resource(name).map_err(|e| user_error(&e))?]),
        None => Ok(geo_tasks()),
    }
}

/// Turns a library error into the message shown to the user.
fn user_error(e: &CivicEtlError) -> anyhow::Error {
    match e.recovery_suggestion() {
        Some(hint) => anyhow!("{}\n\nHint: {hint}", e.user_message()),
        None => anyhow!(e.user_message()),
    }
}
