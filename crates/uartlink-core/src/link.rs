//! Transport capability seam
//!
//! The worker consumes the byte stream through these traits. The serialport
//! implementation lives here; tests supply scripted implementations.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::warn;

use crate::error::InterfaceError;
use crate::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};

/// A live byte-stream link.
///
/// Exactly one link is open at a time and the dispatch worker owns it
/// exclusively. Reads are bounded by the transport's configured read timeout.
pub trait Link: Send {
    /// Read bytes until `delimiter` (inclusive) or the read timeout elapses.
    /// A timeout yields the partial line collected so far, possibly empty.
    fn read_line(&mut self, delimiter: u8) -> io::Result<Vec<u8>>;

    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Push buffered output to the device
    fn flush(&mut self) -> io::Result<()>;

    /// Best-effort close before the handle is dropped
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens links to endpoints
pub trait Transport: Send {
    /// Open `endpoint`, returning a fresh link
    fn open(&self, endpoint: &str) -> Result<Box<dyn Link>, InterfaceError>;
}

/// serialport-backed transport (8N1, no flow control)
#[derive(Debug, Clone)]
pub struct SerialTransport {
    /// Baud rate for opened ports
    pub baud_rate: u32,
    /// Per-call read timeout
    pub read_timeout: Duration,
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl Transport for SerialTransport {
    fn open(&self, endpoint: &str) -> Result<Box<dyn Link>, InterfaceError> {
        let mut port = serialport::new(endpoint, self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map_err(|e| InterfaceError::Serial(e.to_string()))?;
        configure_port(port.as_mut())?;
        Ok(Box::new(SerialLink { port }))
    }
}

/// Standard 8N1 configuration
fn configure_port(port: &mut dyn SerialPort) -> Result<(), InterfaceError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| InterfaceError::Serial(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| InterfaceError::Serial(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| InterfaceError::Serial(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| InterfaceError::Serial(e.to_string()))?;

    // Keep DTR asserted so USB CDC devices do not reset when the port opens.
    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!("failed to assert DTR on open: {e} (continuing)");
    }

    Ok(())
}

struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl Link for SerialLink {
    fn read_line(&mut self, delimiter: u8) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(0) => return Ok(line),
                Ok(_) => {
                    line.push(byte[0]);
                    if byte[0] == delimiter {
                        return Ok(line);
                    }
                }
                Err(ref e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    // Timed out; hand back whatever arrived so far.
                    return Ok(line);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}
