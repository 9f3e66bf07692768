//! Request descriptions
//!
//! A [`Request`] describes one exchange with the device: what to write, what
//! counts as the response, and how long to wait. Once submitted it is owned
//! by the dispatch worker until a terminal event resolves it.

use std::sync::mpsc;
use std::time::Duration;

use crate::event::{Event, ResponseKind};
use crate::{DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_ATTEMPTS};

/// One request/response exchange description
#[derive(Debug, Clone)]
pub struct Request {
    /// Outbound payload; `None` listens without writing anything
    pub payload: Option<String>,
    /// Accepted response prefixes; `None` means fire-and-forget
    pub match_prefixes: Option<Vec<String>>,
    /// Which inbound variant counts as the response
    pub expected: ResponseKind,
    /// Wall-clock budget for each attempt
    pub attempt_timeout: Duration,
    /// Write attempts before giving up; listen-only requests make one
    pub max_attempts: u32,
}

impl Request {
    /// A request that writes `payload` and, until configured otherwise with
    /// [`expect`](Self::expect), expects nothing back (fire-and-forget).
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
            match_prefixes: None,
            expected: ResponseKind::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Listen for a line matching `prefixes` without writing first.
    /// A single attempt is made; there is nothing to retry.
    pub fn listen<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            payload: None,
            match_prefixes: Some(prefixes.into_iter().map(Into::into).collect()),
            expected: ResponseKind::default(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            max_attempts: 1,
        }
    }

    /// Accept responses starting with any of `prefixes`
    pub fn expect<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.match_prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    /// Accept responses starting with `prefix`
    pub fn expect_prefix(self, prefix: impl Into<String>) -> Self {
        self.expect([prefix.into()])
    }

    /// Set which inbound variant counts as the response
    pub fn expect_kind(mut self, kind: ResponseKind) -> Self {
        self.expected = kind;
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the number of write attempts (at least one)
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Whether a response is awaited at all
    pub(crate) fn expects_response(&self) -> bool {
        self.match_prefixes.is_some()
    }

    /// Payload string reported in timeout events (empty for listen-only)
    pub(crate) fn payload_label(&self) -> String {
        self.payload.clone().unwrap_or_default()
    }
}

/// A request queued to the worker, paired with its reply channel
pub(crate) struct PendingRequest {
    pub(crate) request: Request,
    pub(crate) reply: mpsc::Sender<Event>,
}
