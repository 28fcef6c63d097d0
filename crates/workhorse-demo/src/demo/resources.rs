use super::config::DemoConfig;
use core::time::Duration;
use portable_atomic::{AtomicU32, Ordering};
use rand::Rng;
use workhorse::{Error, Resource, ResourcePool};

/// The connection id the factory refuses to create.
const BROKEN_CONNECTION: u32 = 13;

/// A simulated database connection.
#[derive(Debug)]
struct DbConnection {
    id: u32,
}

impl Resource for DbConnection {
    fn close(&mut self) {
        tracing::info!("Close: connection {}", self.id);
    }
}

#[derive(Debug, thiserror::Error)]
#[error("error creating db connection {id}")]
struct DbError {
    id: u32,
}

pub fn run(config: &DemoConfig) -> anyhow::Result<()> {
    let ids = AtomicU32::new(0);
    let pool = ResourcePool::new(
        move || {
            let id = ids.fetch_add(1, Ordering::Relaxed) + 1;
            if id == BROKEN_CONNECTION {
                return Err(DbError { id });
            }
            tracing::info!("Create: new connection {id}");
            Ok(DbConnection { id })
        },
        config.resources,
    )?;

    std::thread::scope(|s| {
        for query in 0..config.queries {
            let pool = &pool;
            s.spawn(move || perform_query(query, pool));
            let pause = rand::rng().random_range(0..500);
            std::thread::sleep(Duration::from_millis(pause));
        }
    });

    tracing::info!("Shutting down the connection pool");
    pool.close();
    Ok(())
}

fn perform_query(query: usize, pool: &ResourcePool<DbConnection, DbError>) {
    let conn = match pool.acquire() {
        Ok(conn) => conn,
        Err(Error::Factory(err)) => {
            tracing::error!(query, "Custom DB error: {err}");
            return;
        }
        Err(err) => {
            tracing::error!(query, "Acquire failed: {err}");
            return;
        }
    };

    let latency = rand::rng().random_range(0..1000);
    std::thread::sleep(Duration::from_millis(latency));
    tracing::info!("Query: QID[{query}] CID[{}]", conn.id);
}
