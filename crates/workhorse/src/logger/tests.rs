use crate::{DropLogger, Error, LoggerConfig, OverflowPolicy, State, WriteOutcome};
use core::time::Duration;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::scope;
use std::time::Instant;

/// Sink whose first write blocks until the test releases it.
struct GatedSink {
    gate: Option<(Sender<()>, Receiver<()>)>,
    out: Vec<u8>,
}

impl GatedSink {
    /// Returns the sink, a receiver signalled when the first write starts and
    /// a sender that lets it finish.
    fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let sink = Self {
            gate: Some((entered_tx, release_rx)),
            out: Vec::new(),
        };
        (sink, entered_rx, release_tx)
    }
}

impl Write for GatedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some((entered, release)) = self.gate.take() {
            let _ = entered.send(());
            let _ = release.recv();
        }
        self.out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that can be inspected after the logger has been dropped.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct FailingSink;

impl Write for FailingSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that accepts writes but fails the final flush.
struct UnflushableSink;

impl Write for UnflushableSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::other("device gone"))
    }
}

/// Sink that panics on any write containing `boom`.
#[derive(Default)]
struct PanickySink(Vec<u8>);

impl Write for PanickySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        assert!(!buf.windows(4).any(|w| w == b"boom"), "sink exploded");
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Gated sink that rejects drop notices but writes ordinary lines.
struct NoticeRejectingSink(GatedSink);

impl Write for NoticeRejectingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.starts_with(b"****") {
            return Err(io::Error::other("notice rejected"));
        }
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn wait_until_drained<W: Write + Send + 'static>(logger: &DropLogger<W>) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while logger.stats().pending > 0 {
        assert!(Instant::now() < deadline, "logger never drained");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn stalled_sink_keeps_three_and_drops_two() {
    let (sink, _entered, release) = GatedSink::new();
    let logger = DropLogger::new(sink, 3).unwrap();

    let start = Instant::now();
    let outcomes: Vec<_> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|line| logger.write(line))
        .collect();
    assert!(start.elapsed() < Duration::from_millis(500));

    assert_eq!(
        outcomes,
        [
            WriteOutcome::Queued,
            WriteOutcome::Queued,
            WriteOutcome::Queued,
            WriteOutcome::Dropped,
            WriteOutcome::Dropped,
        ]
    );
    let stats = logger.stats();
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.pending, 3);

    release.send(()).unwrap();
    let sink = logger.shutdown().unwrap();
    assert_eq!(sink.out, b"a\nb\nc\n");
    assert_eq!(logger.stats().written, 3);
}

#[test]
fn queued_lines_reach_the_sink_in_order() {
    let logger = DropLogger::new(Vec::new(), 64).unwrap();
    for i in 0..50 {
        assert!(logger.write(format!("line {i}")).is_queued());
    }
    let sink = logger.shutdown().unwrap();
    let text = String::from_utf8(sink).unwrap();
    let expected: Vec<_> = (0..50).map(|i| format!("line {i}")).collect();
    assert_eq!(text.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn drops_are_reported_before_the_next_line() {
    let (sink, entered, release) = GatedSink::new();
    let logger = DropLogger::new(sink, 1).unwrap();

    assert_eq!(logger.write("a"), WriteOutcome::Queued);
    entered.recv().unwrap();
    assert_eq!(logger.write("b"), WriteOutcome::Dropped);
    assert_eq!(logger.write("c"), WriteOutcome::Dropped);

    release.send(()).unwrap();
    wait_until_drained(&logger);
    assert_eq!(logger.write("d"), WriteOutcome::Queued);

    let sink = logger.shutdown().unwrap();
    assert_eq!(
        String::from_utf8(sink.out).unwrap(),
        "a\n**** LOG WARNING: dropped 2 log lines ****\nd\n"
    );
}

#[test]
fn drop_reports_can_be_disabled() {
    let (sink, entered, release) = GatedSink::new();
    let logger = DropLogger::with_config(
        sink,
        LoggerConfig {
            capacity: 1,
            report_drops: false,
            ..LoggerConfig::default()
        },
    )
    .unwrap();

    assert!(logger.write("a").is_queued());
    entered.recv().unwrap();
    assert!(!logger.write("b").is_queued());

    release.send(()).unwrap();
    wait_until_drained(&logger);
    assert!(logger.write("c").is_queued());

    let sink = logger.shutdown().unwrap();
    assert_eq!(sink.out, b"a\nc\n");
}

#[test]
fn suspend_policy_waits_for_room() {
    struct SlowSink(Vec<u8>);

    impl Write for SlowSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let logger = DropLogger::with_config(
        SlowSink(Vec::new()),
        LoggerConfig {
            capacity: 1,
            policy: OverflowPolicy::Suspend {
                timeout: Duration::from_secs(5),
            },
            ..LoggerConfig::default()
        },
    )
    .unwrap();

    for line in ["a", "b", "c"] {
        assert_eq!(logger.write(line), WriteOutcome::Queued);
    }

    let sink = logger.shutdown().unwrap();
    assert_eq!(sink.0, b"a\nb\nc\n");
    assert_eq!(logger.stats().dropped, 0);
}

#[test]
fn suspend_policy_suspends_until_drained() {
    let (sink, entered, release) = GatedSink::new();
    let logger = DropLogger::with_config(
        sink,
        LoggerConfig {
            capacity: 1,
            policy: OverflowPolicy::Suspend {
                timeout: Duration::from_millis(20),
            },
            ..LoggerConfig::default()
        },
    )
    .unwrap();

    assert_eq!(logger.write("a"), WriteOutcome::Queued);
    entered.recv().unwrap();

    let start = Instant::now();
    assert_eq!(logger.write("b"), WriteOutcome::Dropped);
    assert!(start.elapsed() >= Duration::from_millis(20));

    // Suspended: dropped without waiting for the timeout.
    assert_eq!(logger.write("c"), WriteOutcome::Dropped);

    release.send(()).unwrap();
    wait_until_drained(&logger);
    assert_eq!(logger.write("d"), WriteOutcome::Queued);

    let sink = logger.shutdown().unwrap();
    assert_eq!(
        String::from_utf8(sink.out).unwrap(),
        "a\n**** LOG WARNING: dropped 2 log lines ****\nd\n"
    );
}

#[test]
fn suspend_policy_with_unbounded_timeout_waits_for_room() {
    let (sink, entered, release) = GatedSink::new();
    let logger = DropLogger::with_config(
        sink,
        LoggerConfig {
            capacity: 1,
            policy: OverflowPolicy::Suspend {
                timeout: Duration::MAX,
            },
            ..LoggerConfig::default()
        },
    )
    .unwrap();

    assert_eq!(logger.write("a"), WriteOutcome::Queued);
    entered.recv().unwrap();

    let outcome = scope(|s| {
        let waiter = s.spawn(|| logger.write("b"));
        std::thread::sleep(Duration::from_millis(20));
        release.send(()).unwrap();
        waiter.join().unwrap()
    });
    assert_eq!(outcome, WriteOutcome::Queued);

    let sink = logger.shutdown().unwrap();
    assert_eq!(sink.out, b"a\nb\n");
    assert_eq!(logger.stats().dropped, 0);
}

#[test]
fn concurrent_producers_never_lose_admitted_lines() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 500;

    let sink = SharedSink::default();
    let logger = DropLogger::with_config(
        sink.clone(),
        LoggerConfig {
            capacity: 16,
            report_drops: false,
            ..LoggerConfig::default()
        },
    )
    .unwrap();

    let queued: usize = scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let logger = &logger;
                s.spawn(move || {
                    (0..PER_THREAD)
                        .filter(|i| logger.write(format!("{t}:{i}")).is_queued())
                        .count()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    logger.shutdown().unwrap();
    let stats = logger.stats();

    assert_eq!(stats.written as usize, queued);
    assert_eq!(stats.written + stats.dropped, (THREADS * PER_THREAD) as u64);
    assert_eq!(sink.text().lines().count(), queued);
}

#[test]
fn sink_errors_are_counted() {
    let logger = DropLogger::new(FailingSink, 4).unwrap();
    for _ in 0..3 {
        assert!(logger.write("lost").is_queued());
    }
    logger.shutdown().unwrap();

    let stats = logger.stats();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.written, 0);
    assert_eq!(stats.pending, 0);
}

#[test]
fn failed_drop_notices_are_counted() {
    let (gated, entered, release) = GatedSink::new();
    let logger = DropLogger::new(NoticeRejectingSink(gated), 1).unwrap();

    assert_eq!(logger.write("a"), WriteOutcome::Queued);
    entered.recv().unwrap();
    assert_eq!(logger.write("b"), WriteOutcome::Dropped);

    release.send(()).unwrap();
    wait_until_drained(&logger);
    assert_eq!(logger.write("c"), WriteOutcome::Queued);

    let sink = logger.shutdown().unwrap();
    assert_eq!(sink.0.out, b"a\nc\n");
    let stats = logger.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 2);
}

#[test]
fn flush_failure_on_shutdown_is_reported() {
    let logger = DropLogger::new(UnflushableSink, 4).unwrap();
    assert!(logger.write("line").is_queued());

    assert!(matches!(logger.shutdown(), Err(Error::Io(_))));
    assert_eq!(logger.state(), State::Closed);
    assert_eq!(logger.stats().written, 1);
}

#[test]
fn panicking_sink_does_not_stop_the_writer() {
    let logger = DropLogger::new(PanickySink::default(), 4).unwrap();
    assert!(logger.write("before").is_queued());
    assert!(logger.write("boom").is_queued());
    wait_until_drained(&logger);

    assert_eq!(logger.state(), State::Accepting);
    assert!(logger.write("after").is_queued());

    let sink = logger.shutdown().unwrap();
    assert_eq!(sink.0, b"before\nafter\n");
    let stats = logger.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.written, 2);
    assert_eq!(stats.pending, 0);
}

#[test]
fn closed_logger_rejects_writes_and_second_shutdown() {
    let logger = DropLogger::new(Vec::new(), 2).unwrap();
    assert_eq!(logger.state(), State::Accepting);

    logger.shutdown().unwrap();
    assert_eq!(logger.state(), State::Closed);
    assert_eq!(logger.write("late"), WriteOutcome::Closed);
    assert!(matches!(logger.shutdown(), Err(Error::Closed)));
}

#[test]
fn dropping_the_logger_flushes_buffered_lines() {
    let sink = SharedSink::default();
    {
        let logger = DropLogger::new(sink.clone(), 8).unwrap();
        assert!(logger.write("one").is_queued());
        assert!(logger.write("two").is_queued());
    }
    assert_eq!(sink.text(), "one\ntwo\n");
}

#[test]
fn rejects_zero_capacity() {
    assert!(matches!(
        DropLogger::new(Vec::new(), 0),
        Err(Error::InvalidCapacity)
    ));
}
