use super::config::DemoConfig;
use core::time::Duration;
use portable_atomic::{AtomicBool, Ordering};
use std::{
    io::{self, Write},
    sync::Arc,
    time::Instant,
};
use workhorse::{DropLogger, LoggerConfig, OverflowPolicy};

/// How long each producer keeps writing.
const RUN_FOR: Duration = Duration::from_secs(3);
/// Pause between two lines from one producer.
const WRITE_EVERY: Duration = Duration::from_millis(10);
/// How long a write may wait for buffer room before logging is suspended.
const WRITE_TIMEOUT: Duration = Duration::from_millis(25);
/// Stall injected into the disk once per "disk full" event.
const STALL: Duration = Duration::from_secs(1);

/// A stdout sink that stalls for [`STALL`] on the next write after
/// [`DiskFullSink::fill`] is triggered.
struct DiskFullSink {
    out: io::Stdout,
    full: Arc<AtomicBool>,
}

impl Write for DiskFullSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.full.swap(false, Ordering::AcqRel) {
            std::thread::sleep(STALL);
        }
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

pub fn run(config: &DemoConfig) -> anyhow::Result<()> {
    let full = Arc::new(AtomicBool::new(false));
    let logger = DropLogger::with_config(
        DiskFullSink {
            out: io::stdout(),
            full: Arc::clone(&full),
        },
        LoggerConfig {
            capacity: config.buffer_capacity,
            policy: OverflowPolicy::Suspend {
                timeout: WRITE_TIMEOUT,
            },
            ..LoggerConfig::default()
        },
    )?;

    tracing::info!(
        producers = config.producers,
        capacity = logger.capacity(),
        "Writing for {:?}, the disk fills up halfway",
        RUN_FOR
    );

    let start = Instant::now();
    std::thread::scope(|s| {
        for producer in 0..config.producers {
            let logger = &logger;
            s.spawn(move || {
                let mut line = 0_u64;
                while start.elapsed() < RUN_FOR {
                    let _ = logger.write(format!("producer {producer}: line {line}"));
                    line += 1;
                    std::thread::sleep(WRITE_EVERY);
                }
            });
        }

        std::thread::sleep(RUN_FOR / 2);
        tracing::warn!("Simulating a full disk");
        full.store(true, Ordering::Release);
    });

    logger.shutdown()?;
    let stats = logger.stats();
    tracing::info!(
        written = stats.written,
        dropped = stats.dropped,
        failed = stats.failed,
        "Logger shut down"
    );
    Ok(())
}
