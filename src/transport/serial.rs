//! Serial transport implementation

use super::{Transport, TransportOpener};
use crate::error::Result;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Read;
use std::time::Duration;

/// Read timeout for the underlying port. Bounded so the forwarding loop
/// wakes periodically to check the stop flag.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Serial transport for UART communication
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Baud rate (e.g., 4800, or 38400 for AIS receivers)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// Opener for a fixed serial port path and baud rate
pub struct SerialOpener {
    path: String,
    baud_rate: u32,
}

impl SerialOpener {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
        }
    }
}

impl TransportOpener for SerialOpener {
    fn open(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SerialTransport::open(&self.path, self.baud_rate)?))
    }

    fn endpoint(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}
