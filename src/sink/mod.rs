//! Output sinks for sentence fan-out

use crate::error::Result;

mod multicast;
mod udp;

pub use multicast::MulticastSink;
pub use udp::UdpSink;

/// Output destination capability.
///
/// A sink delivers one normalized line per call. Send failures are
/// per-sink and non-fatal; the pipeline logs them and keeps going.
pub trait OutputSink: Send {
    /// Deliver one line to the destination
    fn send(&self, line: &[u8]) -> Result<()>;

    /// Destination description for log messages
    fn describe(&self) -> String;

    /// Release the underlying socket. Safe to call more than once.
    fn close(&mut self);
}
