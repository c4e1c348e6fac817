//! salesbase: clean a sales export, load it into a wide-column table and
//! print the scan-based reports.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use salesbase::config::Config;
use salesbase::error::{ConfigSnafu, MetricsSnafu, PipelineError};
use salesbase::metrics::MetricsExporter;
use salesbase::run_pipeline;

/// Sales dataset loader and reporter.
#[derive(Parser, Debug)]
#[command(name = "salesbase")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file. Built-in defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without touching the store.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), PipelineError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("salesbase starting");

    let config = build_config(&args)?;

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Source: {}", config.source.path.display());
        info!("Store: {}", config.store.url);
        info!("Table: {}", config.store.table);
        info!("Row keys: {:?}", config.store.row_keys);
        info!(
            "Reports: preview {} rows, top {} products, single pass: {}",
            config.report.preview_rows, config.report.top_products, config.report.single_pass
        );
        info!("Configuration is valid");
        return Ok(());
    }

    let exporter = if config.metrics.enabled {
        let exporter =
            MetricsExporter::install(config.metrics.textfile_path.clone()).context(MetricsSnafu)?;
        debug!("Metrics recorder installed");
        Some(exporter)
    } else {
        None
    };

    let mut stdout = std::io::stdout();
    let result = run_pipeline(&config, &mut stdout).await;

    // Export whatever was recorded, even for a failed run
    if let Some(exporter) = &exporter {
        exporter.flush().context(MetricsSnafu)?;
    }
    if let Err(e) = &result
        && e.is_table_not_found()
    {
        warn!("Table '{}' is missing; rerun the job to recreate it", config.store.table);
    }
    let stats = result?;

    info!("Pipeline completed successfully");
    info!("  Records loaded: {}", stats.records_loaded);
    info!("  Defaults applied: {}", stats.defaults_applied);
    info!("  Rows written: {}", stats.rows_written);
    info!("  Rows scanned: {}", stats.rows_scanned);

    Ok(())
}

/// Build configuration from arguments.
fn build_config(args: &Args) -> Result<Config, PipelineError> {
    match &args.config {
        Some(path) => Config::from_file(path).context(ConfigSnafu),
        None => {
            let config = Config::default();
            config.validate().context(ConfigSnafu)?;
            Ok(config)
        }
    }
}
