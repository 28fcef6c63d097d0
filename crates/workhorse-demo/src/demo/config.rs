use anyhow::bail;
use clap::{Parser, Subcommand};

/// Runtime configuration for the `workhorse-demo` binary.
///
/// Every value is parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first), with defaults that reproduce the classic runs of
/// each component.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "workhorse-demo",
    version,
    about = "Drives the workhorse worker pools, logger and resource pool"
)]
pub struct CliArgs {
    /// Number of workers in the `pool` and `async-pool` runs.
    ///
    /// Environment variable: `WORKERS`
    #[arg(long, env = "WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Number of submissions that may wait while every worker is busy.
    ///
    /// Zero makes `submit` hand work directly to an idle worker. The async
    /// pool needs at least one slot per worker and rounds zero up.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 0)]
    pub queue_capacity: usize,

    /// Lines the logger buffers before it starts dropping.
    ///
    /// Environment variable: `BUFFER_CAPACITY`
    #[arg(long, env = "BUFFER_CAPACITY", default_value_t = 10)]
    pub buffer_capacity: usize,

    /// Concurrent producers writing to the logger.
    ///
    /// Environment variable: `PRODUCERS`
    #[arg(long, env = "PRODUCERS", default_value_t = 10)]
    pub producers: usize,

    /// Idle connections kept by the resource pool.
    ///
    /// Environment variable: `RESOURCES`
    #[arg(long, env = "RESOURCES", default_value_t = 2)]
    pub resources: usize,

    /// Concurrent queries issued against the resource pool.
    ///
    /// Environment variable: `QUERIES`
    #[arg(long, env = "QUERIES", default_value_t = 25)]
    pub queries: usize,

    #[command(subcommand)]
    pub command: Command,
}

/// The component to run.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Prints a list of names through the thread worker pool.
    Pool,
    /// Floods a logger whose disk stalls halfway through the run.
    Logger,
    /// Shares simulated database connections between queries.
    Resources,
    /// Prints a list of names through the Tokio worker pool.
    #[cfg(feature = "async-tokio")]
    AsyncPool,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub command: Command,
    pub workers: usize,
    pub queue_capacity: usize,
    pub buffer_capacity: usize,
    pub producers: usize,
    pub resources: usize,
    pub queries: usize,
}

impl TryFrom<CliArgs> for DemoConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == 0 {
            bail!("WORKERS must be greater than 0");
        }

        if args.buffer_capacity == 0 {
            bail!("BUFFER_CAPACITY must be greater than 0");
        }

        if args.resources == 0 {
            bail!("RESOURCES must be greater than 0");
        }

        if args.producers == 0 {
            bail!("PRODUCERS must be greater than 0");
        }

        Ok(Self {
            command: args.command,
            workers: args.workers,
            queue_capacity: args.queue_capacity,
            buffer_capacity: args.buffer_capacity,
            producers: args.producers,
            resources: args.resources,
            queries: args.queries,
        })
    }
}
