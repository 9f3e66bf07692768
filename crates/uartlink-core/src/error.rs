//! Interface errors

use thiserror::Error;

/// Errors surfaced by the transport seam and the interface lifecycle.
///
/// These never reach `submit` callers: request outcomes are always delivered
/// as [`Event`](crate::Event)s, and transport faults are recovered by
/// reconnection.
#[derive(Error, Debug)]
pub enum InterfaceError {
    /// The serial port could not be opened or configured
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Transport-level I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `start()` was called while the worker thread is alive
    #[error("Interface already running")]
    AlreadyRunning,
}
