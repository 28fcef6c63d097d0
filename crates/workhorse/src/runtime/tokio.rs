//! Asynchronous worker pool running on Tokio tasks.
//!
//! This module defines the [`AsyncWorkPool`] struct, the async counterpart of
//! [`WorkPool`](crate::WorkPool). It manages a set of worker tasks, each
//! listening on its own bounded [`mpsc::Receiver`], and distributes work in
//! round-robin fashion. Shutdown is coordinated through two
//! [`CancellationToken`]s: one tells the workers to stop taking new work, the
//! other fires once the last worker has drained its queue and exited.
//!
//! Submission first offers the job to each worker without waiting and only
//! awaits room on the round-robin target once every queue is full.

use crate::{Error, PoolStats, Result, State, pool::Shared};
use core::{future::Future, panic::AssertUnwindSafe, time::Duration};
use futures::{FutureExt, future::BoxFuture};
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A unit of asynchronous work executed by an [`AsyncWorkPool`].
///
/// Any `FnOnce() -> impl Future<Output = ()>` closure that is `Send + 'static`
/// is an `AsyncWorker`.
pub trait AsyncWorker: Send + 'static {
    /// Produces the future that performs the work.
    fn work(self: Box<Self>) -> BoxFuture<'static, ()>;
}

impl<F, Fut> AsyncWorker for F
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn work(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin((*self)())
    }
}

type Job = Box<dyn AsyncWorker>;

/// Construction parameters for an [`AsyncWorkPool`].
#[derive(Debug, Clone)]
pub struct AsyncPoolConfig {
    /// Number of worker tasks. Must be greater than zero.
    pub workers: usize,
    /// Capacity of each worker's queue. Must be greater than zero.
    pub queue_capacity: usize,
}

impl Default for AsyncPoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 1,
        }
    }
}

/// Tracks live worker tasks and signals once none are left.
#[derive(Debug)]
struct Drain {
    live: AtomicUsize,
    done: CancellationToken,
}

/// Held by a worker task for its whole life. Dropping the last guard fires
/// [`Drain::done`], also when the runtime aborts the task.
struct WorkerGuard(Arc<Drain>);

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if self.0.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.done.cancel();
        }
    }
}

/// A cooperative pool of Tokio tasks that run [`AsyncWorker`]s.
///
/// Every method takes `&self`, so the pool is usually shared behind an
/// [`Arc`]. Once [`AsyncWorkPool::shutdown`] has started, submissions are
/// refused with [`Error::Closed`].
pub struct AsyncWorkPool {
    workers: Vec<mpsc::Sender<Job>>,
    next_worker: AtomicUsize,
    shutdown_token: CancellationToken,
    drain: Arc<Drain>,
    shared: Arc<Shared>,
}

impl AsyncWorkPool {
    /// Spawns `workers` tasks, each with a single-slot queue.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWorkerCount`] if `workers` is zero.
    /// - [`Error::NoRuntime`] if called outside a Tokio runtime.
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_config(AsyncPoolConfig {
            workers,
            ..AsyncPoolConfig::default()
        })
    }

    /// Spawns a pool from an explicit [`AsyncPoolConfig`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWorkerCount`] if `config.workers` is zero.
    /// - [`Error::InvalidCapacity`] if `config.queue_capacity` is zero.
    /// - [`Error::NoRuntime`] if called outside a Tokio runtime.
    pub fn with_config(config: AsyncPoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(Error::InvalidWorkerCount);
        }
        if config.queue_capacity == 0 {
            return Err(Error::InvalidCapacity);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let shared = Arc::new(Shared::new());
        let shutdown_token = CancellationToken::new();
        let drain = Arc::new(Drain {
            live: AtomicUsize::new(config.workers),
            done: CancellationToken::new(),
        });
        let mut workers = Vec::with_capacity(config.workers);

        for worker_id in 0..config.workers {
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            workers.push(tx);
            runtime.spawn(worker_loop(
                worker_id,
                rx,
                shutdown_token.clone(),
                WorkerGuard(Arc::clone(&drain)),
                Arc::clone(&shared),
            ));
        }

        shared.state.store(State::Accepting);

        Ok(Self {
            workers,
            next_worker: AtomicUsize::new(0),
            shutdown_token,
            drain,
            shared,
        })
    }

    /// Returns the index of the next worker to receive work (round-robin).
    ///
    /// Uses a relaxed atomic increment to minimize contention.
    fn next_worker_index(&self) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % self.workers.len()
    }

    /// Offers `job` to every worker once, starting at `start`. Hands the job
    /// back if every queue is full.
    fn offer(&self, start: usize, mut job: Job) -> Result<core::result::Result<(), Job>> {
        let len = self.workers.len();
        for offset in 0..len {
            match self.workers[(start + offset) % len].try_send(job) {
                Ok(()) => return Ok(Ok(())),
                Err(mpsc::error::TrySendError::Full(back)) => job = back,
                // A closed queue belongs to a worker that is shutting down.
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(Error::Closed),
            }
        }
        Ok(Err(job))
    }

    /// Hands one unit of work to the pool.
    ///
    /// Waits for room on the round-robin target only when every worker queue
    /// is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if shutdown has started.
    pub async fn submit<W: AsyncWorker>(&self, work: W) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::Closed);
        }

        let start = self.next_worker_index();
        let job = match self.offer(start, Box::new(work))? {
            Ok(()) => {
                self.shared.submitted.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
            Err(job) => job,
        };

        tokio::select! {
            biased;
            () = self.shutdown_token.cancelled() => Err(Error::Closed),
            sent = self.workers[start].send(job) => match sent {
                Ok(()) => {
                    self.shared.submitted.fetch_add(1, Ordering::Relaxed);
                    Ok(())
                }
                Err(_) => Err(Error::Closed),
            },
        }
    }

    /// Hands one unit of work to the pool without waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::QueueFull`] if every worker queue is full.
    /// - [`Error::Closed`] if shutdown has started.
    pub fn try_submit<W: AsyncWorker>(&self, work: W) -> Result<()> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::Closed);
        }

        match self.offer(self.next_worker_index(), Box::new(work))? {
            Ok(()) => {
                self.shared.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => Err(Error::QueueFull),
        }
    }

    /// Gracefully shuts down every worker in the pool.
    ///
    /// - Cancels the shared [`CancellationToken`] to refuse new work.
    /// - Waits for every worker to run its queued work and exit.
    ///
    /// A call made while an earlier shutdown is still draining (for example
    /// after [`AsyncWorkPool::shutdown_timeout`] gave up) waits for the same
    /// drain and returns the final stats.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if the pool has already finished shutting
    /// down.
    pub async fn shutdown(&self) -> Result<PoolStats> {
        if self
            .shared
            .state
            .transition(State::Accepting, State::ShuttingDown)
        {
            #[cfg(feature = "tracing")]
            tracing::info!("Refusing new work");
            self.shutdown_token.cancel();
        } else if self.state() == State::Closed {
            return Err(Error::Closed);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Waiting for workers to drain");
        self.drain.done.cancelled().await;

        self.shared.state.store(State::Closed);

        #[cfg(feature = "tracing")]
        tracing::info!("Async worker pool shutdown complete");

        Ok(self.stats())
    }

    /// Like [`AsyncWorkPool::shutdown`] but gives up after `timeout`.
    ///
    /// New work stays refused even when the wait times out, and the workers
    /// keep draining. A later [`AsyncWorkPool::shutdown`] waits for them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the workers did not drain in time, and
    /// otherwise the same errors as [`AsyncWorkPool::shutdown`].
    pub async fn shutdown_timeout(&self, timeout: Duration) -> Result<PoolStats> {
        match tokio::time::timeout(timeout, self.shutdown()).await {
            Ok(result) => result,
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Async worker pool shutdown timed out");
                Err(Error::Timeout)
            }
        }
    }

    /// Number of worker tasks owned by this pool.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.shared.state.load()
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            panicked: self.shared.panicked.load(Ordering::Relaxed),
            queued: self
                .workers
                .iter()
                .map(|tx| tx.max_capacity() - tx.capacity())
                .sum(),
        }
    }
}

impl core::fmt::Debug for AsyncWorkPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AsyncWorkPool")
            .field("workers", &self.workers.len())
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Worker task that runs jobs from its queue until shutdown.
///
/// Once `shutdown` fires the worker closes its queue and runs whatever is
/// still buffered before exiting, so work accepted before the queue closed is
/// never lost.
async fn worker_loop(
    worker_id: usize,
    mut rx: mpsc::Receiver<Job>,
    shutdown: CancellationToken,
    _guard: WorkerGuard,
    shared: Arc<Shared>,
) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    loop {
        tokio::select! {
            biased;
            job = rx.recv() => match job {
                Some(job) => run_job(worker_id, job, &shared).await,
                None => break,
            },
            () = shutdown.cancelled() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} received shutdown signal");
                rx.close();
                while let Some(job) = rx.recv().await {
                    run_job(worker_id, job, &shared).await;
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

async fn run_job(_worker_id: usize, job: Job, shared: &Shared) {
    match AssertUnwindSafe(async move { job.work().await })
        .catch_unwind()
        .await
    {
        Ok(()) => {
            shared.completed.fetch_add(1, Ordering::Relaxed);
        }
        Err(_payload) => {
            shared.panicked.fetch_add(1, Ordering::Relaxed);

            #[cfg(feature = "tracing")]
            tracing::error!(
                "Worker {_worker_id} caught a panicking work item: {}",
                crate::pool::panic_message(&*_payload)
            );
        }
    }
}
