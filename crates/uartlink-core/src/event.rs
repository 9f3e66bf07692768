//! Typed events
//!
//! Every observable outcome of the interface is an [`Event`]: an inbound line,
//! a request resolution, or a connection lifecycle change. Exactly one variant
//! describes any given line or outcome, and events are immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped observable outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event was produced
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub kind: EventKind,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// The closed set of event variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    /// A successfully parsed, non-empty ASCII line
    TextResponse {
        /// Line content with the device's one-character prompt prefix removed
        content: String,
    },
    /// A line that carried no content after delimiter and whitespace trimming
    EmptyLine {
        /// Why the line was considered empty
        reason: String,
    },
    /// A malformed line: truncated delimiter run, illegal byte, or decode failure
    InvalidLine {
        /// Hex dump of the offending bytes, `-`-separated
        raw: String,
        /// What made the line invalid
        reason: String,
    },
    /// No matching response arrived within the request's retry budget
    ResponseTimeout {
        /// The outbound payload that went unanswered (empty for listen-only)
        request: String,
    },
    /// A correlated result was produced but not claimed by the caller in time.
    /// Indicates a latent bug if ever observed.
    RequestHandlerTimeout {
        /// The outbound payload of the unclaimed request
        request: String,
    },
    /// A link was opened
    LinkEstablished {
        /// The endpoint that accepted the connection
        endpoint: String,
    },
    /// The link was lost
    LinkLost {
        /// The underlying fault, the forced-reconnect marker, or `None` on a
        /// clean stop
        reason: Option<String>,
    },
    /// No link is currently open
    LinkUnavailable,
}

impl EventKind {
    /// Text the response match predicate compares prefixes against
    pub fn match_text(&self) -> Option<&str> {
        match self {
            EventKind::TextResponse { content } => Some(content),
            EventKind::InvalidLine { raw, .. } => Some(raw),
            EventKind::EmptyLine { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Selects which inbound variant a request accepts as its response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// Expect a [`EventKind::TextResponse`]
    #[default]
    Text,
    /// Expect an [`EventKind::EmptyLine`]
    Empty,
    /// Expect an [`EventKind::InvalidLine`]
    Invalid,
}

impl ResponseKind {
    /// Whether `kind` is the expected inbound variant
    pub fn matches(&self, kind: &EventKind) -> bool {
        matches!(
            (self, kind),
            (ResponseKind::Text, EventKind::TextResponse { .. })
                | (ResponseKind::Empty, EventKind::EmptyLine { .. })
                | (ResponseKind::Invalid, EventKind::InvalidLine { .. })
        )
    }
}
