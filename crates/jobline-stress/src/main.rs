#![doc = include_str!("../README.md")]

mod config;
mod load;
mod telemetry;

use clap::Parser;
use config::{CliArgs, StressConfig};
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention: every submitted job
// is a boxed closure allocated on a producer thread and freed on a worker.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = StressConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let report = load::run(&config)?;
    tracing::info!("{report}");

    Ok(())
}

fn log_startup_info(config: &StressConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting stress run with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting stress run: {} producers x {} jobs on {} workers",
            config.producers,
            config.jobs_per_producer,
            config.workers
        );
    }
}
