//! Best-effort logger that drops lines instead of blocking producers.
//!
//! [`DropLogger`] accepts log lines from any number of threads and hands them
//! to one dedicated writer thread that owns the sink. When the sink cannot keep
//! up and the buffer fills, new lines are discarded so producers never wait on
//! I/O.
//!
//! ## Buffer accounting
//!
//! A line occupies a buffer slot from the moment it is admitted until the sink
//! has finished writing it, including the line the writer thread is currently
//! stuck on. A logger with capacity `n` therefore holds at most `n` unwritten
//! lines, regardless of where the writer thread is in its loop.
//!
//! ## Overflow policies
//!
//! - [`OverflowPolicy::Drop`] discards the line immediately when the buffer is
//!   full. `write` never waits.
//! - [`OverflowPolicy::Suspend`] waits up to a timeout for room. If none shows
//!   up, logging is suspended: every line is dropped until the buffer has fully
//!   drained, after which logging resumes.
//!
//! With `report_drops` enabled, the first line admitted after a run of drops
//! is preceded in the sink by a notice carrying the number of lost lines.

#[cfg(feature = "make-writer")]
mod make_writer;
mod writer;

#[cfg(test)]
mod tests;

use crate::{AtomicState, Error, Result, State};
use core::time::Duration;
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::{Condvar, Mutex, RwLock};
use portable_atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::{io::Write, sync::Arc, thread::JoinHandle, time::Instant};
use writer::writer_loop;

/// What a [`DropLogger`] does with a line when its buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the line without waiting.
    #[default]
    Drop,
    /// Wait up to `timeout` for room, then discard the line and suspend
    /// logging until the buffer has drained.
    Suspend {
        /// Longest time a single `write` may wait for room.
        timeout: Duration,
    },
}

/// Construction parameters for a [`DropLogger`].
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Maximum number of unwritten lines. Must be greater than zero.
    pub capacity: usize,
    /// Behavior once `capacity` lines are pending.
    pub policy: OverflowPolicy,
    /// Write a notice to the sink after lines were dropped.
    pub report_drops: bool,
    /// Name of the writer thread.
    pub thread_name: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            policy: OverflowPolicy::Drop,
            report_drops: true,
            thread_name: String::from("workhorse-logger"),
        }
    }
}

/// Result of a single [`DropLogger::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum WriteOutcome {
    /// The line was buffered and will reach the sink before shutdown returns.
    Queued,
    /// The buffer was full (or logging is suspended) and the line was
    /// discarded.
    Dropped,
    /// The logger has been shut down.
    Closed,
}

impl WriteOutcome {
    /// Returns `true` if the line will reach the sink.
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Queued)
    }
}

/// Point-in-time counters for a [`DropLogger`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggerStats {
    /// Lines written to the sink.
    pub written: u64,
    /// Lines discarded because the buffer was full or logging was suspended.
    pub dropped: u64,
    /// Lines and drop notices the sink failed to write, or panicked on.
    pub failed: u64,
    /// Lines admitted but not yet written.
    pub pending: usize,
}

/// A line travelling from producers to the writer thread.
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) line: String,
    /// Drops to report before this line. Zero when there is nothing to report.
    pub(crate) dropped_before: u64,
}

/// Slot accounting and counters shared between producers and the writer thread.
#[derive(Debug)]
pub(crate) struct LogBuffer {
    capacity: usize,
    pending: AtomicUsize,
    pub(crate) written: AtomicU64,
    pub(crate) failed: AtomicU64,
    dropped: AtomicU64,
    unreported: AtomicU64,
    suspended: AtomicBool,
    state: AtomicState,
    notify_room: bool,
    room_lock: Mutex<()>,
    room: Condvar,
}

impl LogBuffer {
    fn new(config: &LoggerConfig) -> Self {
        Self {
            capacity: config.capacity,
            pending: AtomicUsize::new(0),
            written: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            unreported: AtomicU64::new(0),
            suspended: AtomicBool::new(false),
            state: AtomicState::new(),
            notify_room: matches!(config.policy, OverflowPolicy::Suspend { .. }),
            room_lock: Mutex::new(()),
            room: Condvar::new(),
        }
    }

    /// Claims a buffer slot if fewer than `capacity` lines are pending.
    fn try_admit(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| {
                (p < self.capacity).then_some(p + 1)
            })
            .is_ok()
    }

    /// Returns a slot once its line has been written (or failed to be).
    pub(crate) fn release_slot(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
        if self.notify_room {
            // Taking the lock orders this notification after any waiter's
            // failed admission check.
            drop(self.room_lock.lock());
            self.room.notify_all();
        }
    }

    /// Blocks until a slot can be claimed or `timeout` elapses. A timeout too
    /// large to express as an [`Instant`] waits without a deadline.
    fn wait_for_room(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.room_lock.lock();
        loop {
            if self.try_admit() {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.room.wait_until(&mut guard, deadline).timed_out() {
                        return self.try_admit();
                    }
                }
                None => self.room.wait(&mut guard),
            }
        }
    }

    fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.unreported.fetch_add(1, Ordering::Relaxed);
    }
}

/// Buffered, non-blocking log writer backed by one writer thread.
///
/// Producers call [`DropLogger::write`] through a shared reference; wrap the
/// logger in an [`Arc`] to hand it to spawned threads. The sink is returned by
/// [`DropLogger::shutdown`] after every buffered line has been written.
///
/// # Example
///
/// ```
/// use workhorse::{DropLogger, WriteOutcome};
///
/// let logger = DropLogger::new(Vec::new(), 8).unwrap();
/// assert_eq!(logger.write("hello"), WriteOutcome::Queued);
/// assert_eq!(logger.write("world"), WriteOutcome::Queued);
///
/// let sink = logger.shutdown().unwrap();
/// assert_eq!(sink, b"hello\nworld\n");
/// ```
pub struct DropLogger<W> {
    sender: RwLock<Option<Sender<Entry>>>,
    handle: Mutex<Option<JoinHandle<W>>>,
    shared: Arc<LogBuffer>,
    policy: OverflowPolicy,
    report_drops: bool,
}

impl<W> DropLogger<W>
where
    W: Write + Send + 'static,
{
    /// Creates a logger writing to `sink` that buffers up to `capacity`
    /// unwritten lines and drops the rest.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCapacity`] if `capacity` is zero.
    /// - [`Error::Io`] if the writer thread cannot be spawned.
    pub fn new(sink: W, capacity: usize) -> Result<Self> {
        Self::with_config(
            sink,
            LoggerConfig {
                capacity,
                ..LoggerConfig::default()
            },
        )
    }

    /// Creates a logger from an explicit [`LoggerConfig`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCapacity`] if `config.capacity` is zero.
    /// - [`Error::Io`] if the writer thread cannot be spawned.
    pub fn with_config(sink: W, config: LoggerConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let (sender, receiver) = crossbeam_channel::bounded(config.capacity);
        let shared = Arc::new(LogBuffer::new(&config));

        let writer_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || writer_loop(sink, receiver, writer_shared))?;

        shared.state.store(State::Accepting);

        Ok(Self {
            sender: RwLock::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            shared,
            policy: config.policy,
            report_drops: config.report_drops,
        })
    }

    /// Offers one line to the logger.
    ///
    /// Under [`OverflowPolicy::Drop`] this never blocks: the line is either
    /// buffered or discarded on the spot. Under [`OverflowPolicy::Suspend`] it
    /// waits at most the configured timeout.
    pub fn write(&self, line: impl Into<String>) -> WriteOutcome {
        // Only shutdown takes the write lock. Failing to get a read lock means
        // the logger is closing.
        let Some(guard) = self.sender.try_read() else {
            return WriteOutcome::Closed;
        };
        let Some(sender) = guard.as_ref() else {
            return WriteOutcome::Closed;
        };

        if self.shared.suspended.load(Ordering::Acquire) {
            if self.shared.pending.load(Ordering::Acquire) > 0 {
                self.shared.record_drop();
                return WriteOutcome::Dropped;
            }
            if self.shared.suspended.swap(false, Ordering::AcqRel) {
                #[cfg(feature = "tracing")]
                tracing::warn!("Logging resumed after the buffer drained");
            }
        }

        if self.shared.try_admit() {
            return self.enqueue(sender, line.into());
        }

        match self.policy {
            OverflowPolicy::Drop => {
                self.shared.record_drop();
                WriteOutcome::Dropped
            }
            OverflowPolicy::Suspend { timeout } => {
                // Release the lock while waiting so shutdown is not held up.
                let sender = sender.clone();
                drop(guard);

                if self.shared.wait_for_room(timeout) {
                    return self.enqueue(&sender, line.into());
                }

                self.shared.record_drop();
                if !self.shared.suspended.swap(true, Ordering::AcqRel) {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        timeout_ms = timeout.as_millis() as u64,
                        "Log write timed out, suspending logging"
                    );
                }
                WriteOutcome::Dropped
            }
        }
    }

    /// Closes the logger and waits for the writer thread to flush every
    /// buffered line. Returns the sink.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if the logger was already shut down.
    /// - [`Error::WorkerPanicked`] if the writer thread panicked.
    /// - [`Error::Io`] if the final flush of the sink fails.
    pub fn shutdown(&self) -> Result<W> {
        if !self
            .shared
            .state
            .transition(State::Accepting, State::ShuttingDown)
        {
            return Err(Error::Closed);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(pending = self.stats().pending, "Flushing logger");

        // The writer drains the queue and exits once every sender is gone.
        drop(self.sender.write().take());

        let handle = self.handle.lock().take();
        let result = match handle.map(JoinHandle::join) {
            Some(Ok(mut sink)) => sink.flush().map(|()| sink).map_err(Error::from),
            Some(Err(_)) => Err(Error::WorkerPanicked { count: 1 }),
            None => Err(Error::Closed),
        };

        self.shared.state.store(State::Closed);

        #[cfg(feature = "tracing")]
        {
            let stats = self.stats();
            if stats.dropped > 0 || stats.failed > 0 {
                tracing::warn!(
                    dropped = stats.dropped,
                    failed = stats.failed,
                    "Logger shut down with lost lines"
                );
            }
        }

        result
    }

    /// Current lifecycle state.
    pub fn state(&self) -> State {
        self.shared.state.load()
    }

    /// Maximum number of unwritten lines.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Snapshot of the logger counters.
    pub fn stats(&self) -> LoggerStats {
        LoggerStats {
            written: self.shared.written.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            pending: self.shared.pending.load(Ordering::Acquire),
        }
    }

    /// Sends an admitted line. The caller must already hold a slot.
    fn enqueue(&self, sender: &Sender<Entry>, line: String) -> WriteOutcome {
        let dropped_before = if self.report_drops {
            self.shared.unreported.swap(0, Ordering::Relaxed)
        } else {
            0
        };

        match sender.try_send(Entry {
            line,
            dropped_before,
        }) {
            Ok(()) => WriteOutcome::Queued,
            Err(e) => {
                // Give back the slot and the unreported count.
                self.shared.pending.fetch_sub(1, Ordering::AcqRel);
                self.shared
                    .unreported
                    .fetch_add(dropped_before, Ordering::Relaxed);
                match e {
                    TrySendError::Full(_) => {
                        self.shared.record_drop();
                        WriteOutcome::Dropped
                    }
                    TrySendError::Disconnected(_) => WriteOutcome::Closed,
                }
            }
        }
    }
}

impl<W> Drop for DropLogger<W> {
    fn drop(&mut self) {
        // Mirror `shutdown` without requiring the `Write` bound: closing the
        // channel and joining drains every buffered line.
        if self
            .shared
            .state
            .transition(State::Accepting, State::ShuttingDown)
        {
            drop(self.sender.get_mut().take());
            if let Some(handle) = self.handle.get_mut().take() {
                let _ = handle.join();
            }
            self.shared.state.store(State::Closed);
        }
    }
}

impl<W> core::fmt::Debug for DropLogger<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DropLogger")
            .field("capacity", &self.shared.capacity)
            .field("policy", &self.policy)
            .field("state", &self.shared.state.load())
            .finish_non_exhaustive()
    }
}
