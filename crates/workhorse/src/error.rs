//! Error types shared by every primitive in this crate.
//!
//! Misuse that the source channel idioms would answer with a panic (sending
//! after close, closing twice) is reported as a typed [`Error`] instead.
//!
//! ## Error Cases
//! - `InvalidWorkerCount`: a pool was configured with zero workers.
//! - `InvalidCapacity`: a logger or resource pool was configured with a zero
//!   capacity.
//! - `Closed`: the operation arrived after shutdown began.
//! - `QueueFull`: a non-blocking submission found no free slot.
//! - `Timeout`: a bounded wait expired.
//! - `WorkerPanicked`: one or more worker threads died outside the panic
//!   guard.
//! - `Io`: the logger sink failed to flush.
//! - `Factory`: a resource factory returned an error.
//! - `NoRuntime`: an async pool was created outside a Tokio runtime.

use core::convert::Infallible;

/// A result type whose error defaults to the infallible [`Error`].
///
/// Only [`ResourcePool`](crate::ResourcePool) carries a non-trivial `E`; every
/// other API in this crate uses the default.
pub type Result<T, E = Infallible> = core::result::Result<T, Error<E>>;

/// All possible errors that `workhorse` can produce.
///
/// The generic parameter `E` is the error type of a user supplied resource
/// factory and only appears in [`Error::Factory`].
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error<E = Infallible> {
    /// A pool needs at least one worker.
    #[error("worker count must be greater than zero")]
    InvalidWorkerCount,

    /// A buffer or resource pool needs room for at least one element.
    #[error("capacity must be greater than zero")]
    InvalidCapacity,

    /// The target has been shut down and no longer accepts requests.
    #[error("already shut down")]
    Closed,

    /// No queue slot was free and the caller asked not to wait.
    #[error("queue is full")]
    QueueFull,

    /// A bounded wait expired before the operation could complete.
    #[error("timed out")]
    Timeout,

    /// Worker threads terminated with a panic that escaped the work guard.
    #[error("{count} worker(s) panicked")]
    WorkerPanicked { count: usize },

    /// The logger sink failed to flush on shutdown.
    #[error("sink error: {0}")]
    Io(#[from] std::io::Error),

    /// A resource factory failed to produce a new resource.
    #[error("resource factory failed: {0}")]
    Factory(#[source] E),

    /// An async pool was built outside of a Tokio runtime.
    ///
    /// Only available when the `async-tokio` feature is enabled.
    #[cfg(feature = "async-tokio")]
    #[error("no Tokio runtime is available")]
    NoRuntime,
}

impl<E> Error<E> {
    /// Returns `true` if this error means the target was already shut down.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
