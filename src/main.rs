use clap::Parser;
use glob::glob;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use series_reconciler::collector::Collector;
use series_reconciler::config::Config;
use series_reconciler::reconcile::reconcile;
use series_reconciler::sink;

#[derive(Parser)]
#[command(name = "series-reconciler")]
#[command(about = "Merge dated station exports into one series per station", long_about = None)]
struct Cli {
    /// Path to the .ini parameter file
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    info!("parameter file: {}", cli.config.display());

    let config = Config::from_file(&cli.config)?;
    info!(
        "format {:?}, {} stations configured",
        config.format,
        config.extraction.len()
    );

    // list the input files; ordering is whatever the filesystem gives us,
    // the ledger keys by vintage so it does not matter
    let mut files = Vec::new();
    for entry in glob(&config.input_pattern)? {
        files.push(entry?);
    }
    info!(
        "{} file(s) matched by pattern {}",
        files.len(),
        config.input_pattern
    );

    let mut collector = Collector::new(&config.extraction, config.format);
    for file in &files {
        collector.ingest_file(file)?;
    }

    let ledgers = collector.into_ledgers();
    let reconciled = reconcile(&ledgers);

    for (entity, series) in &reconciled {
        sink::write_series(&config.output_dir, entity, series)?;
    }
    info!(
        "wrote {} series to {}",
        reconciled.len(),
        config.output_dir.display()
    );

    Ok(())
}
