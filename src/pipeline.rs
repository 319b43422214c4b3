//! Forwarding pipeline: serial acquisition, validation, fan-out
//!
//! The pipeline owns the whole forwarding run:
//!
//! ```text
//! Opening ──ok──> Streaming ──fault──> Reconnecting (fixed backoff)
//!    ^                │                      │
//!    └────────────────┼──────────────────────┘
//!                     └──stop flag──> Closed (outputs torn down once)
//! ```
//!
//! Lines are processed strictly in arrival order on one thread: validate,
//! normalize, echo, then every sink, then the TCP broadcast. A failure on
//! one destination is logged and never suppresses delivery to the rest.
//!
//! Reopen attempts are unbounded with a fixed delay: the daemon sits
//! unattended behind a flaky cable or USB adapter and must keep trying
//! forever.

use crate::error::{Error, Result};
use crate::framing::LineReader;
use crate::sentence;
use crate::server::TcpBroadcastServer;
use crate::sink::OutputSink;
use crate::transport::TransportOpener;
use log::{error, info, warn};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Delay between reopen attempts after a transport fault
const REOPEN_DELAY: Duration = Duration::from_secs(2);

/// Fixed-delay retry strategy.
///
/// Kept as a value object rather than a bare constant so tests run with a
/// zero delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
}

impl Backoff {
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Sleep for the configured delay, waking early when `running` clears
    pub fn wait(&self, running: &AtomicBool) {
        let deadline = Instant::now() + self.delay;
        while running.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(REOPEN_DELAY)
    }
}

/// Pipeline behavior toggles
#[derive(Debug, Clone, Default)]
pub struct ForwardingOptions {
    /// Discard sentences whose checksum does not verify
    pub drop_bad_checksum: bool,
    /// Mirror forwarded (and dropped) sentences to stdout
    pub echo: bool,
}

/// Orchestrator: owns the acquisition loop and drives every output per line
pub struct ForwardingPipeline {
    opener: Box<dyn TransportOpener>,
    sinks: Vec<Box<dyn OutputSink>>,
    server: Option<TcpBroadcastServer>,
    options: ForwardingOptions,
    backoff: Backoff,
    running: Arc<AtomicBool>,
}

impl ForwardingPipeline {
    pub fn new(
        opener: Box<dyn TransportOpener>,
        sinks: Vec<Box<dyn OutputSink>>,
        server: Option<TcpBroadcastServer>,
        options: ForwardingOptions,
    ) -> Self {
        Self {
            opener,
            sinks,
            server,
            options,
            backoff: Backoff::default(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Replace the reopen backoff (tests use a zero delay)
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Use an externally owned stop flag
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Shared stop flag; clear it (e.g. from a signal handler) to end `run`
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run until the stop flag clears.
    ///
    /// Acquisition failures and mid-stream transport faults log, back off,
    /// and retry forever. Teardown closes every sink and the TCP server
    /// exactly once.
    pub fn run(&mut self) -> Result<()> {
        while self.running.load(Ordering::Relaxed) {
            info!("Opening line source: {}", self.opener.endpoint());
            let transport = match self.opener.open() {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        "Failed to open {}: {}. Retrying in {:?}",
                        self.opener.endpoint(),
                        e,
                        self.backoff.delay
                    );
                    self.backoff.wait(&self.running);
                    continue;
                }
            };

            let mut reader = LineReader::new(transport);
            if let Err(e) = self.stream_lines(&mut reader) {
                match &e {
                    Error::Serial(_) | Error::Io(_) => warn!(
                        "Transport fault on {}: {}. Reconnecting in {:?}",
                        self.opener.endpoint(),
                        e,
                        self.backoff.delay
                    ),
                    other => error!(
                        "Unexpected stream error: {}. Reopening in {:?}",
                        other, self.backoff.delay
                    ),
                }
                self.backoff.wait(&self.running);
            }
        }

        self.shutdown_outputs();
        Ok(())
    }

    /// Read and forward lines until the stop flag clears or the transport
    /// faults. A timeout read (no complete line yet) is ignored so the
    /// loop can observe the stop flag.
    fn stream_lines(&self, reader: &mut LineReader) -> Result<()> {
        while self.running.load(Ordering::Relaxed) {
            match reader.read_line()? {
                Some(raw) => self.forward(&raw),
                None => {}
            }
        }
        Ok(())
    }

    /// Validate, normalize, and fan one raw line out to every destination
    fn forward(&self, raw: &[u8]) {
        if self.options.drop_bad_checksum && !sentence::checksum_ok(raw) {
            if self.options.echo {
                echo_dropped(raw);
            }
            return;
        }

        let line = sentence::normalize(raw);

        if self.options.echo {
            echo_forwarded(&line);
        }

        for sink in &self.sinks {
            if let Err(e) = sink.send(&line) {
                warn!("Send to {} failed: {}", sink.describe(), e);
            }
        }

        if let Some(server) = &self.server {
            server.broadcast(&line);
        }
    }

    /// Close every output once; each close is independent and infallible
    fn shutdown_outputs(&mut self) {
        info!("Closing outputs");
        for sink in &mut self.sinks {
            sink.close();
        }
        if let Some(mut server) = self.server.take() {
            server.close();
        }
    }
}

/// Best-effort stdout mirror of a forwarded line
fn echo_forwarded(line: &[u8]) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(line);
}

/// Best-effort stdout marker for a dropped sentence
fn echo_dropped(raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "[DROP] {}", text.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, Transport};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Records every line it is given
    #[derive(Clone, Default)]
    struct RecordingSink {
        lines: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: Arc<Mutex<usize>>,
    }

    impl RecordingSink {
        fn lines(&self) -> Vec<Vec<u8>> {
            self.lines.lock().clone()
        }

        fn close_count(&self) -> usize {
            *self.closed.lock()
        }
    }

    impl OutputSink for RecordingSink {
        fn send(&self, line: &[u8]) -> Result<()> {
            self.lines.lock().push(line.to_vec());
            Ok(())
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }

        fn close(&mut self) {
            *self.closed.lock() += 1;
        }
    }

    /// Always fails to send
    struct FailingSink;

    impl OutputSink for FailingSink {
        fn send(&self, _line: &[u8]) -> Result<()> {
            Err(Error::Other("injected sink failure".to_string()))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }

        fn close(&mut self) {}
    }

    /// Hands out scripted transports; clears the stop flag once exhausted
    /// so `run` terminates deterministically.
    struct ScriptedOpener {
        script: Mutex<VecDeque<MockTransport>>,
        running: Arc<AtomicBool>,
    }

    impl TransportOpener for ScriptedOpener {
        fn open(&self) -> Result<Box<dyn Transport>> {
            match self.script.lock().pop_front() {
                Some(t) => Ok(Box::new(t)),
                None => {
                    self.running.store(false, Ordering::Relaxed);
                    Err(Error::Other("script exhausted".to_string()))
                }
            }
        }

        fn endpoint(&self) -> String {
            "mock".to_string()
        }
    }

    fn source(lines: &[u8]) -> MockTransport {
        let mock = MockTransport::new();
        mock.inject_read(lines);
        mock.fail_when_drained();
        mock
    }

    fn run_to_completion(
        sources: Vec<MockTransport>,
        sinks: Vec<Box<dyn OutputSink>>,
        server: Option<TcpBroadcastServer>,
        options: ForwardingOptions,
    ) {
        let running = Arc::new(AtomicBool::new(true));
        let opener = ScriptedOpener {
            script: Mutex::new(VecDeque::from_iter(sources)),
            running: Arc::clone(&running),
        };
        let mut pipeline = ForwardingPipeline::new(Box::new(opener), sinks, server, options)
            .with_backoff(Backoff::new(Duration::ZERO))
            .with_stop_flag(running);
        pipeline.run().unwrap();
    }

    #[test]
    fn forwards_normalized_lines_in_order_to_every_sink() {
        let s1 = RecordingSink::default();
        let s2 = RecordingSink::default();
        run_to_completion(
            vec![source(b"$A\n$B\r\n")],
            vec![Box::new(s1.clone()), Box::new(s2.clone())],
            None,
            ForwardingOptions::default(),
        );

        let expected: Vec<Vec<u8>> = vec![b"$A\r\n".to_vec(), b"$B\r\n".to_vec()];
        assert_eq!(s1.lines(), expected);
        assert_eq!(s2.lines(), expected);
    }

    #[test]
    fn reconnects_and_resumes_after_transport_fault() {
        let sink = RecordingSink::default();
        run_to_completion(
            vec![source(b"$A\r\n"), source(b"$B\r\n")],
            vec![Box::new(sink.clone())],
            None,
            ForwardingOptions::default(),
        );

        assert_eq!(
            sink.lines(),
            vec![b"$A\r\n".to_vec(), b"$B\r\n".to_vec()]
        );
    }

    #[test]
    fn failing_sink_does_not_reduce_delivery_to_others() {
        let ok = RecordingSink::default();
        run_to_completion(
            vec![source(b"$A\r\n$B\r\n")],
            vec![Box::new(FailingSink), Box::new(ok.clone())],
            None,
            ForwardingOptions::default(),
        );

        assert_eq!(ok.lines().len(), 2);
    }

    #[test]
    fn drop_bad_checksum_discards_before_any_sink() {
        let sink = RecordingSink::default();
        run_to_completion(
            vec![source(b"$GPGGA,1,2,3*7A\r\n$GPGGA,1,2,3*4A\r\n")],
            vec![Box::new(sink.clone())],
            None,
            ForwardingOptions {
                drop_bad_checksum: true,
                echo: false,
            },
        );

        assert_eq!(sink.lines(), vec![b"$GPGGA,1,2,3*4A\r\n".to_vec()]);
    }

    #[test]
    fn checksum_less_lines_pass_even_in_drop_mode() {
        let sink = RecordingSink::default();
        run_to_completion(
            vec![source(b"$NOSTAR,1\r\n")],
            vec![Box::new(sink.clone())],
            None,
            ForwardingOptions {
                drop_bad_checksum: true,
                echo: false,
            },
        );

        assert_eq!(sink.lines(), vec![b"$NOSTAR,1\r\n".to_vec()]);
    }

    #[test]
    fn sinks_are_closed_once_on_shutdown() {
        let sink = RecordingSink::default();
        run_to_completion(
            vec![source(b"$A\r\n")],
            vec![Box::new(sink.clone())],
            None,
            ForwardingOptions::default(),
        );

        assert_eq!(sink.close_count(), 1);
    }

    #[test]
    fn backoff_wakes_immediately_when_stopped() {
        let running = AtomicBool::new(false);
        let backoff = Backoff::new(Duration::from_secs(60));
        let start = Instant::now();
        backoff.wait(&running);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
