//! The dedicated worker thread
//!
//! Owns the link for its whole lifetime: runs ordered connect sweeps over the
//! candidate list, then the dispatch loop that alternates between serving
//! queued requests and polling unsolicited inbound traffic, and funnels every
//! exit from the connected state back into reconnection. No fault terminates
//! the thread except a stop request.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::event::{Event, EventKind};
use crate::interface::{EventCallback, InterfaceConfig, Status};
use crate::link::{Link, Transport};
use crate::parse::parse_line;
use crate::request::{PendingRequest, Request};

/// Upper bound on one timed wait inside the reconnect pause, so stop requests
/// are noticed promptly
const PAUSE_SLICE: Duration = Duration::from_millis(250);

pub(crate) struct Worker {
    config: InterfaceConfig,
    transport: Box<dyn Transport>,
    callback: Option<EventCallback>,
    request_rx: Receiver<PendingRequest>,
    status: Arc<Status>,
}

impl Worker {
    pub(crate) fn new(
        config: InterfaceConfig,
        transport: Box<dyn Transport>,
        callback: Option<EventCallback>,
        request_rx: Receiver<PendingRequest>,
        status: Arc<Status>,
    ) -> Self {
        Self {
            config,
            transport,
            callback,
            request_rx,
            status,
        }
    }

    /// Thread entry: alternate between connect sweeps and the dispatch loop
    /// until stopped
    pub(crate) fn run(self) {
        while !self.stop_requested() {
            if let Some(link) = self.connect() {
                self.status.connected.store(true, Ordering::SeqCst);
                self.dispatch(link);
                self.status.connected.store(false, Ordering::SeqCst);
            }
            self.reconnect_pause();
        }
        info!("serial worker stopped");
    }

    fn stop_requested(&self) -> bool {
        self.status.stop_requested.load(Ordering::SeqCst)
    }

    fn force_reconnect_requested(&self) -> bool {
        self.status.force_reconnect.load(Ordering::SeqCst)
    }

    /// Try each candidate endpoint in order; the first that opens wins and
    /// the rest are not tried
    fn connect(&self) -> Option<Box<dyn Link>> {
        self.status.force_reconnect.store(false, Ordering::SeqCst);
        for endpoint in &self.config.candidates {
            match self.transport.open(endpoint) {
                Ok(link) => {
                    info!(
                        "link opened on {endpoint} at baud {}",
                        self.config.baud_rate
                    );
                    self.log_info(&Event::now(EventKind::LinkEstablished {
                        endpoint: endpoint.clone(),
                    }));
                    return Some(link);
                }
                Err(e) => error!("failed to open {endpoint}: {e}"),
            }
        }
        None
    }

    /// Dispatch loop: serve exactly one queued request per iteration, or
    /// perform one bounded inbound read when the queue is idle. Exits on a
    /// stop request, a forced reconnect, or an I/O fault, always closing the
    /// link and emitting `LinkLost`.
    fn dispatch(&self, mut link: Box<dyn Link>) {
        let mut fault: Option<io::Error> = None;

        loop {
            if self.stop_requested() || self.force_reconnect_requested() {
                break;
            }
            match self.request_rx.try_recv() {
                Ok(pending) => match self.correlate(link.as_mut(), &pending.request) {
                    Ok(Some(event)) => {
                        let _ = pending.reply.send(event);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // Resolve the in-flight request before handing
                        // control back to reconnection.
                        let _ = pending.reply.send(Event::now(EventKind::LinkUnavailable));
                        fault = Some(e);
                        break;
                    }
                },
                Err(TryRecvError::Empty) => {
                    if let Err(e) = self.poll_inbound(link.as_mut()) {
                        fault = Some(e);
                        break;
                    }
                }
                Err(TryRecvError::Disconnected) => {
                    // Façade dropped; nothing can ever be queued again.
                    self.status.stop_requested.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }

        let reason = if self.force_reconnect_requested() {
            self.status.force_reconnect.store(false, Ordering::SeqCst);
            Some("Reconnect Forced".to_string())
        } else {
            fault.map(|e| e.to_string())
        };

        if let Err(e) = link.close() {
            warn!("failed to close link: {e}");
        }
        self.log_info(&Event::now(EventKind::LinkLost { reason }));
    }

    /// Run one request to a terminal event. `Ok(None)` is a completed
    /// fire-and-forget write; transport faults propagate to the dispatch loop.
    fn correlate(&self, link: &mut dyn Link, request: &Request) -> io::Result<Option<Event>> {
        let payload = match &request.payload {
            None => return self.await_response(link, request).map(Some),
            Some(payload) => payload,
        };

        for attempt in 1..=request.max_attempts.max(1) {
            link.write_all(payload.as_bytes())?;
            link.write_all(&[self.config.write_terminator])?;
            link.flush()?;

            if !request.expects_response() {
                return Ok(None);
            }

            let event = self.await_response(link, request)?;
            if matches!(event.kind, EventKind::ResponseTimeout { .. }) {
                debug!("request {payload:?} attempt {attempt} timed out");
                continue;
            }
            return Ok(Some(event));
        }

        let event = Event::now(EventKind::ResponseTimeout {
            request: payload.clone(),
        });
        self.log_info(&event);
        Ok(Some(event))
    }

    /// Read lines until one matches the request's predicate or the attempt
    /// deadline passes. Non-matching lines, unsolicited ones included, are
    /// logged and discarded; each attempt performs at least one read.
    fn await_response(&self, link: &mut dyn Link, request: &Request) -> io::Result<Event> {
        let deadline = Instant::now() + request.attempt_timeout;
        loop {
            let raw = link.read_line(self.config.read_delimiter)?;
            if !raw.is_empty() {
                let event = parse_line(Some(&raw));
                self.log_inbound(&event);
                if Self::is_match(request, &event) {
                    return Ok(event);
                }
            }
            if Instant::now() > deadline {
                return Ok(Event::now(EventKind::ResponseTimeout {
                    request: request.payload_label(),
                }));
            }
        }
    }

    /// The response match predicate: expected variant plus any accepted prefix
    fn is_match(request: &Request, event: &Event) -> bool {
        if !request.expected.matches(&event.kind) {
            return false;
        }
        let Some(prefixes) = &request.match_prefixes else {
            return false;
        };
        let Some(text) = event.kind.match_text() else {
            return false;
        };
        prefixes.iter().any(|prefix| text.starts_with(prefix.as_str()))
    }

    /// One bounded inbound read; unsolicited traffic goes to the event sink
    /// only, never to any reply channel
    fn poll_inbound(&self, link: &mut dyn Link) -> io::Result<()> {
        let raw = link.read_line(self.config.read_delimiter)?;
        if !raw.is_empty() {
            let event = parse_line(Some(&raw));
            self.log_inbound(&event);
        }
        Ok(())
    }

    /// Quiescent interval between connect sweeps. Requests queued meanwhile
    /// are resolved immediately with `LinkUnavailable` instead of starving
    /// until the next connect.
    fn reconnect_pause(&self) {
        let deadline = Instant::now() + self.config.reconnect_pause;
        while !self.stop_requested() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(PAUSE_SLICE);
            match self.request_rx.recv_timeout(slice) {
                Ok(pending) => {
                    let event = Event::now(EventKind::LinkUnavailable);
                    self.log_info(&event);
                    let _ = pending.reply.send(event);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.status.stop_requested.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Debug-log an inbound event and forward parsed text to the callback
    fn log_inbound(&self, event: &Event) {
        debug!("inbound: {:?}", event.kind);
        if let EventKind::TextResponse { .. } = event.kind {
            if let Some(callback) = &self.callback {
                callback(event);
            }
        }
    }

    /// Info-log a lifecycle or terminal event
    fn log_info(&self, event: &Event) {
        info!("serial event: {:?}", event.kind);
    }
}
