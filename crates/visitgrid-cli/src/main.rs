mod cli;

use anyhow::Context;
use clap::Parser;
use cli::config::{CliArgs, RunConfig};
use cli::telemetry::init_telemetry;
use visitgrid::{Aggregator, NoKnownIdentifiers, RunSummary, UriListFile};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let aggregator = Aggregator::new(config.aggregator.clone());
    let summary = match &config.known_identifiers {
        Some(path) => aggregator.run(
            &config.input,
            &UriListFile::new(path, config.aggregator.layout.prefix_len),
            &config.output,
        ),
        None => aggregator.run(&config.input, &NoKnownIdentifiers, &config.output),
    }
    .with_context(|| {
        format!(
            "aggregating {} into {}",
            config.input.display(),
            config.output.display()
        )
    })?;

    log_summary(&config, &summary);
    Ok(())
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting visitgrid with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Aggregating {} with {} workers",
            config.input.display(),
            config.aggregator.worker_count
        );
    }
}

fn log_summary(config: &RunConfig, summary: &RunSummary) {
    tracing::info!(
        "Wrote {}: {} records over {} bytes, {} of {} slugs, {} cells, {} bytes",
        config.output.display(),
        summary.records,
        summary.file_size,
        summary.write.slugs_written,
        summary.slugs,
        summary.write.cells_written,
        summary.write.bytes_written
    );
}
