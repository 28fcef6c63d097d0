//! Console logging for the demo binary.
//!
//! Events are formatted by `tracing_subscriber::fmt` and handed to a
//! [`DropLogger`] over stderr, so a slow terminal never stalls the pools being
//! demonstrated. `RUST_LOG` controls filtering and defaults to `info`.

use std::{io, sync::Arc};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use workhorse::{DropLogger, LoggerConfig};

/// Lines of formatted events buffered before the console logger drops.
const CONSOLE_BUFFER: usize = 4096;

pub struct Telemetry {
    console: Arc<DropLogger<io::Stderr>>,
}

pub fn init_telemetry() -> anyhow::Result<Telemetry> {
    let console = Arc::new(DropLogger::with_config(
        io::stderr(),
        LoggerConfig {
            capacity: CONSOLE_BUFFER,
            thread_name: String::from("console-logger"),
            ..LoggerConfig::default()
        },
    )?);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::clone(&console))
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;

    Ok(Telemetry { console })
}

impl Telemetry {
    /// Flushes every buffered event to stderr.
    pub fn shutdown(self) {
        if let Err(err) = self.console.shutdown() {
            eprintln!("Error flushing console logger: {err:#?}");
        }
        let stats = self.console.stats();
        if stats.dropped > 0 {
            eprintln!("Console logger dropped {} events", stats.dropped);
        }
    }
}
