use super::{Entry, LogBuffer};
use crossbeam_channel::Receiver;
use portable_atomic::Ordering;
use std::{
    io::{self, Write},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

/// Body of the logger's writer thread.
///
/// Writes every received [`Entry`] to `sink`, newline terminated, until the
/// channel is disconnected and empty. A slot is released only after the sink
/// call returns, so a stalled sink keeps its line counted against the buffer.
///
/// Sink errors and sink panics are counted as failures, not retried. Returns
/// the sink so shutdown can hand it back to the caller.
pub(crate) fn writer_loop<W: Write>(
    mut sink: W,
    rx: Receiver<Entry>,
    shared: Arc<LogBuffer>,
) -> W {
    for entry in rx.iter() {
        // No tracing here: this thread may be the sink of the subscriber.
        match catch_unwind(AssertUnwindSafe(|| write_entry(&mut sink, &entry, &shared))) {
            Ok(Ok(())) => {
                shared.written.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(_)) | Err(_) => {
                shared.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        shared.release_slot();
    }

    sink
}

fn write_entry<W: Write>(sink: &mut W, entry: &Entry, shared: &LogBuffer) -> io::Result<()> {
    if entry.dropped_before > 0
        && writeln!(
            sink,
            "**** LOG WARNING: dropped {} log lines ****",
            entry.dropped_before
        )
        .is_err()
    {
        shared.failed.fetch_add(1, Ordering::Relaxed);
    }

    sink.write_all(entry.line.as_bytes())?;
    sink.write_all(b"\n")
}
