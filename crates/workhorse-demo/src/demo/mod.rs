pub mod config;
pub mod telemetry;

#[cfg(feature = "async-tokio")]
mod async_pool;
mod logger;
mod pool;
mod resources;

use config::{Command, DemoConfig};

/// Runs the component selected on the command line.
pub fn run(config: &DemoConfig) -> anyhow::Result<()> {
    match config.command {
        Command::Pool => pool::run(config),
        Command::Logger => logger::run(config),
        Command::Resources => resources::run(config),
        #[cfg(feature = "async-tokio")]
        Command::AsyncPool => async_pool::run(config),
    }
}

/// Names handed to the worker pools, one work item each.
const NAMES: [&str; 5] = ["steve", "bob", "mary", "therese", "jason"];
