//! # UartLink Core Library
//!
//! Request/response transport layer for line-oriented ASCII device CLIs
//! spoken over a serial byte stream.
//!
//! This library provides:
//! - Line framing and parsing of raw inbound bytes into typed events
//! - A connection lifecycle that opens, monitors, and re-establishes the link
//! - Request/response correlation with per-attempt timeouts and retries
//! - A thread-safe submission API serializing concurrent callers onto one port
//!
//! ## Example
//!
//! ```rust,ignore
//! use uartlink_core::{InterfaceConfig, Request, SerialInterface};
//!
//! let iface = SerialInterface::new(InterfaceConfig::with_candidates([
//!     "/dev/ttyUSB0",
//!     "/dev/ttyACM0",
//! ]));
//! iface.start()?;
//!
//! let response = iface.submit(Request::new("version").expect_prefix("OK"));
//! println!("{:?}", response.kind);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod interface;
pub mod link;
pub mod parse;
pub mod request;
mod worker;

pub use error::InterfaceError;
pub use event::{Event, EventKind, ResponseKind};
pub use interface::{EventCallback, InterfaceConfig, SerialInterface};
pub use link::{Link, SerialTransport, Transport};
pub use parse::parse_line;
pub use request::Request;

use std::time::Duration;

/// Default baud rate for device communication
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default transport read timeout; bounds one inbound poll
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Default per-attempt response timeout
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default number of write attempts per request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default quiescent interval between connect sweeps of the candidate list
pub const DEFAULT_RECONNECT_PAUSE: Duration = Duration::from_secs(3);

/// Delimiter the device terminates inbound lines with
pub const DEFAULT_READ_DELIMITER: u8 = b'\r';

/// Terminator appended to every outbound payload
pub const DEFAULT_WRITE_TERMINATOR: u8 = b'\n';

/// Slack added to the caller-side wait bound on top of the full retry budget,
/// absorbing dispatch scheduling and queue latency
pub const RESPONSE_CLAIM_SLACK: Duration = Duration::from_secs(10);
