//! Transport layer for I/O abstraction

use crate::error::Result;

mod serial;
pub use serial::{SerialOpener, SerialTransport};

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockTransport;

/// Transport trait for byte-level line sources
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read.
    ///
    /// `Ok(0)` means no data arrived within the transport's internal read
    /// timeout; callers treat it as an idle interval, not end-of-stream.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;
}

/// Re-openable transport acquisition.
///
/// The forwarding loop discards a faulted transport and asks the opener
/// for a fresh one after backoff, so acquisition has to be repeatable.
pub trait TransportOpener: Send {
    /// Open a new transport instance
    fn open(&self) -> Result<Box<dyn Transport>>;

    /// Endpoint description for log messages (e.g. "/dev/ttyUSB0 @ 4800 baud")
    fn endpoint(&self) -> String;
}
