//! Bounded pool of reusable, closable resources.
//!
//! [`ResourcePool`] keeps up to `capacity` idle resources (database
//! connections, sockets, scratch buffers) for threads to share. A miss calls
//! the user supplied factory; returning a resource to a full pool closes it.
//!
//! Acquired resources come back wrapped in [`Pooled`], which releases them to
//! the pool when dropped.

use crate::{Error, Result};
use core::{
    fmt,
    ops::{Deref, DerefMut},
};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;

/// A resource that can be managed by a [`ResourcePool`].
///
/// `close` is called exactly once for every resource the pool discards: on
/// overflow, on release after close, and for every idle resource when the pool
/// itself is closed.
pub trait Resource {
    /// Releases whatever the resource holds.
    fn close(&mut self);
}

type Factory<R, E> = Box<dyn Fn() -> core::result::Result<R, E> + Send + Sync>;

/// A pool of resources shared safely between threads.
///
/// # Example
///
/// ```
/// use workhorse::{Resource, ResourcePool};
///
/// struct Connection(u32);
///
/// impl Resource for Connection {
///     fn close(&mut self) {}
/// }
///
/// let pool = ResourcePool::new(|| Ok::<_, std::io::Error>(Connection(1)), 2).unwrap();
/// {
///     let conn = pool.acquire().unwrap();
///     assert_eq!(conn.0, 1);
/// } // released back to the pool
/// assert_eq!(pool.idle(), 1);
/// pool.close();
/// ```
pub struct ResourcePool<R, E> {
    idle_tx: Sender<R>,
    idle_rx: Receiver<R>,
    factory: Factory<R, E>,
    // Serializes release against close so no resource is parked after close.
    closed: Mutex<bool>,
}

impl<R, E> ResourcePool<R, E>
where
    R: Resource,
{
    /// Creates a pool that keeps at most `capacity` idle resources and calls
    /// `factory` whenever none is available.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCapacity`] if `capacity` is zero.
    pub fn new<F>(factory: F, capacity: usize) -> Result<Self, E>
    where
        F: Fn() -> core::result::Result<R, E> + Send + Sync + 'static,
    {
        if capacity == 0 {
            return Err(Error::InvalidCapacity);
        }

        let (idle_tx, idle_rx) = crossbeam_channel::bounded(capacity);
        Ok(Self {
            idle_tx,
            idle_rx,
            factory: Box::new(factory),
            closed: Mutex::new(false),
        })
    }

    /// Takes an idle resource, or creates a new one if none is available.
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] if the pool has been closed.
    /// - [`Error::Factory`] if a new resource was needed and the factory
    ///   failed.
    pub fn acquire(&self) -> Result<Pooled<'_, R, E>, E> {
        let resource = self.acquire_raw()?;
        Ok(Pooled {
            pool: self,
            resource: Some(resource),
        })
    }

    /// Like [`ResourcePool::acquire`] but hands over ownership. The caller is
    /// responsible for calling [`ResourcePool::release`].
    ///
    /// # Errors
    ///
    /// Same as [`ResourcePool::acquire`].
    pub fn acquire_raw(&self) -> Result<R, E> {
        if *self.closed.lock() {
            return Err(Error::Closed);
        }

        match self.idle_rx.try_recv() {
            Ok(resource) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Acquire: shared resource");
                Ok(resource)
            }
            Err(TryRecvError::Empty) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Acquire: new resource");
                (self.factory)().map_err(Error::Factory)
            }
            // Both ends live in `self`.
            Err(TryRecvError::Disconnected) => Err(Error::Closed),
        }
    }

    /// Puts a resource back into the pool, or closes it if the pool is closed
    /// or already holds `capacity` idle resources.
    pub fn release(&self, mut resource: R) {
        let closed = self.closed.lock();

        if *closed {
            resource.close();
            return;
        }

        match self.idle_tx.try_send(resource) {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Release: in queue");
            }
            Err(TrySendError::Full(mut resource) | TrySendError::Disconnected(mut resource)) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Release: closing");
                resource.close();
            }
        }
    }

    /// Closes the pool and every idle resource. Later calls are no-ops.
    pub fn close(&self) {
        let mut closed = self.closed.lock();
        if *closed {
            return;
        }
        *closed = true;

        let mut _closed = 0_usize;
        for mut resource in self.idle_rx.try_iter() {
            resource.close();
            _closed += 1;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(closed = _closed, "Resource pool closed");
    }

    /// Returns `true` once [`ResourcePool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Number of idle resources currently parked in the pool.
    pub fn idle(&self) -> usize {
        self.idle_rx.len()
    }

    /// Maximum number of idle resources the pool keeps.
    pub fn capacity(&self) -> usize {
        self.idle_tx.capacity().unwrap_or(0)
    }
}

impl<R, E> fmt::Debug for ResourcePool<R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("idle", &self.idle_rx.len())
            .field("capacity", &self.idle_tx.capacity())
            .field("closed", &*self.closed.lock())
            .finish_non_exhaustive()
    }
}

/// A resource on loan from a [`ResourcePool`].
///
/// Dereferences to the resource and returns it to the pool on drop.
pub struct Pooled<'a, R, E>
where
    R: Resource,
{
    pool: &'a ResourcePool<R, E>,
    resource: Option<R>,
}

impl<R, E> Pooled<'_, R, E>
where
    R: Resource,
{
    /// Removes the resource from pool management. It will not be released or
    /// closed automatically.
    pub fn detach(mut self) -> R {
        self.resource
            .take()
            .unwrap_or_else(|| unreachable!("resource taken before drop"))
    }
}

impl<R, E> Deref for Pooled<'_, R, E>
where
    R: Resource,
{
    type Target = R;

    fn deref(&self) -> &R {
        self.resource
            .as_ref()
            .unwrap_or_else(|| unreachable!("resource taken before drop"))
    }
}

impl<R, E> DerefMut for Pooled<'_, R, E>
where
    R: Resource,
{
    fn deref_mut(&mut self) -> &mut R {
        self.resource
            .as_mut()
            .unwrap_or_else(|| unreachable!("resource taken before drop"))
    }
}

impl<R, E> Drop for Pooled<'_, R, E>
where
    R: Resource,
{
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release(resource);
        }
    }
}

impl<R, E> fmt::Debug for Pooled<'_, R, E>
where
    R: Resource + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&self.resource).finish()
    }
}
