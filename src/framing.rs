//! Line framing over a byte transport
//!
//! Buffers transport reads and emits one `\n`-terminated line at a time,
//! terminator included so the validator sees the original bytes. Partial
//! tails survive read timeouts, so a sentence split across reads is
//! reassembled intact.

use crate::error::Result;
use crate::transport::Transport;

/// Read chunk size. NMEA sentences top out at 82 bytes; one chunk holds
/// several sentences at typical baud rates.
const CHUNK_SIZE: usize = 512;

/// Upper bound on an unterminated line. Garbage at a wrong baud rate can
/// stream bytes without ever producing a newline; past this the buffer is
/// discarded and reading continues.
const MAX_LINE_LEN: usize = 4096;

/// Incremental line reader over a [`Transport`]
pub struct LineReader {
    transport: Box<dyn Transport>,
    buffer: Vec<u8>,
}

impl LineReader {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            buffer: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    /// Next complete line, terminator included.
    ///
    /// Returns `Ok(None)` when no full line arrived within the transport's
    /// read timeout; the caller loops and retries. Transport errors
    /// propagate so the caller can reconnect.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let rest = self.buffer.split_off(pos + 1);
                let line = std::mem::replace(&mut self.buffer, rest);
                return Ok(Some(line));
            }

            let mut chunk = [0u8; CHUNK_SIZE];
            let n = self.transport.read(&mut chunk)?;
            if n == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..n]);

            if self.buffer.len() > MAX_LINE_LEN {
                log::warn!(
                    "Discarding {} unterminated bytes (wrong baud rate?)",
                    self.buffer.len()
                );
                self.buffer.clear();
            }
        }
    }
}
