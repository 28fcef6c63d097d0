use super::{NAMES, config::DemoConfig};
use core::time::Duration;
use workhorse::{AsyncPoolConfig, AsyncWorkPool};

/// Rounds of [`NAMES`] submitted to the pool.
const ROUNDS: usize = 20;
/// Upper bound on the graceful shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub fn run(config: &DemoConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()?;
    runtime.block_on(run_async(config))
}

async fn run_async(config: &DemoConfig) -> anyhow::Result<()> {
    let pool = AsyncWorkPool::with_config(AsyncPoolConfig {
        workers: config.workers,
        queue_capacity: config.queue_capacity.max(1),
    })?;

    tracing::info!(
        workers = pool.workers(),
        "Printing {} names on Tokio tasks",
        ROUNDS * NAMES.len()
    );

    for round in 0..ROUNDS {
        for name in NAMES {
            pool.submit(move || async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                tracing::info!(round, "{name}");
            })
            .await?;
        }
    }

    let stats = pool.shutdown_timeout(SHUTDOWN_TIMEOUT).await?;
    tracing::info!(?stats, "Async worker pool shut down");
    Ok(())
}
