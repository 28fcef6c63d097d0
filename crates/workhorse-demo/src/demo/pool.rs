use super::{NAMES, config::DemoConfig};
use core::time::Duration;
use workhorse::{PoolConfig, WorkPool, Worker};

/// Rounds of [`NAMES`] submitted to the pool.
const ROUNDS: usize = 20;

/// Prints its name after a short pause.
struct NamePrinter {
    name: &'static str,
    round: usize,
}

impl Worker for NamePrinter {
    fn work(self: Box<Self>) {
        std::thread::sleep(Duration::from_millis(50));
        tracing::info!(round = self.round, "{}", self.name);
    }
}

pub fn run(config: &DemoConfig) -> anyhow::Result<()> {
    let pool = WorkPool::with_config(PoolConfig {
        workers: config.workers,
        queue_capacity: config.queue_capacity,
        ..PoolConfig::default()
    })?;

    tracing::info!(
        workers = pool.workers(),
        queue_capacity = config.queue_capacity,
        "Printing {} names",
        ROUNDS * NAMES.len()
    );

    std::thread::scope(|s| -> anyhow::Result<()> {
        let submitters: Vec<_> = (0..ROUNDS)
            .map(|round| {
                let pool = &pool;
                s.spawn(move || -> workhorse::Result<()> {
                    for name in NAMES {
                        pool.submit(NamePrinter { name, round })?;
                    }
                    Ok(())
                })
            })
            .collect();

        for submitter in submitters {
            submitter
                .join()
                .map_err(|_| anyhow::anyhow!("submitter thread panicked"))??;
        }
        Ok(())
    })?;

    let stats = pool.shutdown()?;
    tracing::info!(?stats, "Worker pool shut down");
    Ok(())
}
