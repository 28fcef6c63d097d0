//! Fixed-size pool of worker threads fed by a bounded queue.
//!
//! This module defines the [`WorkPool`] struct, which owns a set of long-lived
//! worker threads that all pull from one shared [`crossbeam_channel`] queue.
//! Submission applies backpressure: once the queue is full and every worker is
//! busy, [`WorkPool::submit`] blocks the caller until a slot frees up.
//!
//! Shutdown is graceful. Dropping the sending half of the queue lets each
//! worker drain whatever is still buffered before its receive loop ends, and
//! the pool then joins every thread.

mod worker;


use crate::{AtomicState, Error, Result, State};
use core::time::Duration;
use crossbeam_channel::{SendTimeoutError, Sender, TrySendError};
use portable_atomic::{AtomicU64, Ordering};
use std::{sync::Arc, thread::JoinHandle};
use worker::worker_loop;

#[cfg(all(feature = "tracing", feature = "async-tokio"))]
pub(crate) use worker::panic_message;

/// A unit of work executed by a [`WorkPool`].
///
/// Any `FnOnce() + Send + 'static` closure is a `Worker`, so most callers never
/// implement this trait by hand. Implement it directly when the work item is a
/// named type that carries its own state.
///
/// # Example
///
/// ```
/// use workhorse::{WorkPool, Worker};
///
/// struct NamePrinter {
///     name: String,
/// }
///
/// impl Worker for NamePrinter {
///     fn work(self: Box<Self>) {
///         println!("{}", self.name);
///     }
/// }
///
/// let pool = WorkPool::new(2).unwrap();
/// pool.submit(NamePrinter { name: "steve".into() }).unwrap();
/// pool.submit(|| println!("bob")).unwrap();
/// pool.shutdown().unwrap();
/// ```
pub trait Worker: Send + 'static {
    /// Runs the work item to completion. Errors are the item's own concern;
    /// the pool does not observe them.
    fn work(self: Box<Self>);
}

impl<F> Worker for F
where
    F: FnOnce() + Send + 'static,
{
    fn work(self: Box<Self>) {
        (*self)();
    }
}

pub(crate) type Job = Box<dyn Worker>;

/// Construction parameters for a [`WorkPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads. Must be greater than zero.
    pub workers: usize,
    /// Number of submissions that may wait in the queue while every worker is
    /// busy. Zero makes the queue a rendezvous point: `submit` returns only
    /// once a worker has taken the item.
    pub queue_capacity: usize,
    /// Prefix for worker thread names. The worker index is appended.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 0,
            thread_name: String::from("workhorse-worker"),
        }
    }
}

/// Point-in-time counters for a [`WorkPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Work items accepted by `submit` and friends.
    pub submitted: u64,
    /// Work items that ran to completion.
    pub completed: u64,
    /// Work items that panicked. The worker that ran them keeps serving.
    pub panicked: u64,
    /// Work items sitting in the queue, not yet picked up by a worker.
    pub queued: usize,
}

/// Counters and lifecycle shared between the pool handle and its workers.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) panicked: AtomicU64,
    pub(crate) state: AtomicState,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            state: AtomicState::new(),
        }
    }
}

/// A fixed set of worker threads pulling [`Worker`]s from a bounded queue.
///
/// The pool can be shared by reference across threads (for example with
/// [`std::thread::scope`]) since every submission method takes `&self`.
/// [`WorkPool::shutdown`] consumes the pool, so a submission can never race a
/// completed shutdown.
pub struct WorkPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl WorkPool {
    /// Creates a pool of `workers` threads with a rendezvous queue.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWorkerCount`] if `workers` is zero.
    /// - [`Error::Io`] if the OS refuses to spawn a thread.
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_config(PoolConfig {
            workers,
            ..PoolConfig::default()
        })
    }

    /// Creates a pool from an explicit [`PoolConfig`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidWorkerCount`] if `config.workers` is zero.
    /// - [`Error::Io`] if the OS refuses to spawn a thread.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(Error::InvalidWorkerCount);
        }

        let (sender, receiver) = crossbeam_channel::bounded::<Job>(config.queue_capacity);
        let shared = Arc::new(Shared::new());
        let mut handles = Vec::with_capacity(config.workers);

        for worker_id in 0..config.workers {
            let rx = receiver.clone();
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("{}-{worker_id}", config.thread_name))
                .spawn(move || worker_loop(worker_id, rx, shared))?;
            handles.push(handle);
        }

        shared.state.store(State::Accepting);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Work pool started"
        );

        Ok(Self {
            sender: Some(sender),
            handles,
            shared,
        })
    }

    /// Hands one unit of work to the pool.
    ///
    /// Blocks while the queue is full and all workers are busy. There is no
    /// timeout; see [`WorkPool::submit_timeout`] for a bounded wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] if every worker has gone away.
    pub fn submit<W: Worker>(&self, work: W) -> Result<()> {
        let sender = self.accepting_sender()?;
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        sender.send(Box::new(work)).map_err(|_| {
            self.shared.submitted.fetch_sub(1, Ordering::Relaxed);
            Error::Closed
        })
    }

    /// Hands one unit of work to the pool without waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::QueueFull`] if no slot is free right now. With a rendezvous
    ///   queue that means no worker is idle.
    /// - [`Error::Closed`] if every worker has gone away.
    pub fn try_submit<W: Worker>(&self, work: W) -> Result<()> {
        let sender = self.accepting_sender()?;
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        sender.try_send(Box::new(work)).map_err(|e| {
            self.shared.submitted.fetch_sub(1, Ordering::Relaxed);
            match e {
                TrySendError::Full(_) => Error::QueueFull,
                TrySendError::Disconnected(_) => Error::Closed,
            }
        })
    }

    /// Hands one unit of work to the pool, waiting at most `timeout` for room.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no slot freed up in time.
    /// - [`Error::Closed`] if every worker has gone away.
    pub fn submit_timeout<W: Worker>(&self, work: W, timeout: Duration) -> Result<()> {
        let sender = self.accepting_sender()?;
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        sender.send_timeout(Box::new(work), timeout).map_err(|e| {
            self.shared.submitted.fetch_sub(1, Ordering::Relaxed);
            match e {
                SendTimeoutError::Timeout(_) => Error::Timeout,
                SendTimeoutError::Disconnected(_) => Error::Closed,
            }
        })
    }

    /// Number of worker threads owned by this pool.
    pub fn workers(&self) -> usize {
        self.handles.len()
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
            queued: self.sender.as_ref().map_or(0, Sender::len),
        }
    }

    /// Closes the queue and blocks until all queued and in-flight work has run.
    ///
    /// Returns the final counters once every worker thread has exited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPanicked`] if a worker thread died outside the
    /// per-item panic guard. All other workers are still joined first.
    pub fn shutdown(mut self) -> Result<PoolStats> {
        let dead = self.close();
        let stats = self.stats();

        if dead > 0 {
            return Err(Error::WorkerPanicked { count: dead });
        }
        Ok(stats)
    }

    fn accepting_sender(&self) -> Result<&Sender<Job>> {
        match &self.sender {
            Some(sender) if self.shared.state.load().is_accepting() => Ok(sender),
            _ => Err(Error::Closed),
        }
    }

    /// Drops the sender, joins every worker and returns how many of them
    /// terminated abnormally.
    fn close(&mut self) -> usize {
        if self.sender.is_none() {
            return 0;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(queued = self.stats().queued, "Draining work pool");

        self.shared.state.store(State::ShuttingDown);
        // Workers leave their receive loop once the queue is empty and
        // disconnected.
        drop(self.sender.take());

        let mut dead = 0;
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                dead += 1;
            }
        }

        self.shared.state.store(State::Closed);

        #[cfg(feature = "tracing")]
        tracing::debug!(dead, "Work pool shut down");

        dead
    }
}

impl Drop for WorkPool {
    fn drop(&mut self) {
        self.close();
    }
}

impl core::fmt::Debug for WorkPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkPool")
            .field("workers", &self.workers())
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}
