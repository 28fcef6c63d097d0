#![doc = include_str!("../README.md")]

mod demo;

use clap::Parser;
use demo::config::{CliArgs, DemoConfig};
use demo::telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = DemoConfig::try_from(args)?;

    let telemetry = init_telemetry()?;
    log_startup_info(&config);

    let result = demo::run(&config);
    if let Err(ref err) = result {
        tracing::error!("Demo failed: {err:#}");
    }

    telemetry.shutdown();
    result
}

fn log_startup_info(config: &DemoConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting {:?} with full config: {:#?}", config.command, config);
    } else {
        tracing::info!("Starting {:?}", config.command);
    }
}
