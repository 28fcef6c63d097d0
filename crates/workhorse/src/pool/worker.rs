use super::{Job, Shared};
use crossbeam_channel::Receiver;
use portable_atomic::Ordering;
use std::{
    any::Any,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

/// Body of every pool thread.
///
/// Pulls [`Job`]s off the shared queue and runs them one at a time. The loop
/// ends once the queue is disconnected and empty, which is how
/// [`WorkPool::shutdown`](crate::WorkPool::shutdown) drains remaining work.
///
/// Each job runs under [`catch_unwind`] so a panicking work item is counted and
/// logged without taking the thread down with it.
pub(crate) fn worker_loop(worker_id: usize, rx: Receiver<Job>, shared: Arc<Shared>) {
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    for job in rx.iter() {
        match catch_unwind(AssertUnwindSafe(|| job.work())) {
            Ok(()) => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(_payload) => {
                shared.panicked.fetch_add(1, Ordering::Relaxed);

                #[cfg(feature = "tracing")]
                tracing::error!(
                    "Worker {worker_id} caught a panicking work item: {}",
                    panic_message(&*_payload)
                );
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

/// Best-effort extraction of the message carried by a panic payload.
#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}
