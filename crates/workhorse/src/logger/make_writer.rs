//! [`MakeWriter`] integration so a [`DropLogger`] can back a `tracing`
//! subscriber.
//!
//! The `fmt` layer formats each event into one buffer and hands it over with a
//! single `write_all`, so every `write` on a `&DropLogger` becomes one line.
//! Both `DropLogger<W>` and `Arc<DropLogger<W>>` are accepted by
//! `with_writer`; the latter keeps a handle around for shutdown.
//!
//! ```no_run
//! use std::sync::Arc;
//! use workhorse::DropLogger;
//!
//! let logger = Arc::new(DropLogger::new(std::io::stderr(), 1024).unwrap());
//! tracing_subscriber::fmt()
//!     .with_writer(Arc::clone(&logger))
//!     .init();
//!
//! tracing::info!("goes through the drop logger");
//! logger.shutdown().unwrap();
//! ```

use super::DropLogger;
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;

impl<W> Write for &DropLogger<W>
where
    W: Write + Send + 'static,
{
    /// Offers `buf` as one line. Never fails: a dropped or closed line is
    /// already accounted for in the logger's stats.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if !line.is_empty() {
            let _ = DropLogger::write(*self, line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a, W> MakeWriter<'a> for DropLogger<W>
where
    W: Write + Send + 'static,
{
    type Writer = &'a DropLogger<W>;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
