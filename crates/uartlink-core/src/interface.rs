//! Public façade
//!
//! [`SerialInterface`] is the thread-safe submission API. Any number of
//! callers may call [`submit`](SerialInterface::submit) concurrently; work is
//! handed to a single dedicated worker thread over a FIFO request channel and
//! each request is resolved through its own reply channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::InterfaceError;
use crate::event::{Event, EventKind};
use crate::link::{SerialTransport, Transport};
use crate::request::{PendingRequest, Request};
use crate::worker::Worker;
use crate::{
    DEFAULT_BAUD_RATE, DEFAULT_READ_DELIMITER, DEFAULT_READ_TIMEOUT, DEFAULT_RECONNECT_PAUSE,
    DEFAULT_WRITE_TERMINATOR, RESPONSE_CLAIM_SLACK,
};

/// Interface configuration
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    /// Candidate endpoints tried in order on every connect sweep; the first
    /// one that opens wins
    pub candidates: Vec<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Transport read timeout; bounds one inbound poll
    pub read_timeout: Duration,
    /// Delimiter terminating inbound lines
    pub read_delimiter: u8,
    /// Terminator appended to every outbound payload
    pub write_terminator: u8,
    /// Quiescent interval between connect sweeps
    pub reconnect_pause: Duration,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            read_delimiter: DEFAULT_READ_DELIMITER,
            write_terminator: DEFAULT_WRITE_TERMINATOR,
            reconnect_pause: DEFAULT_RECONNECT_PAUSE,
        }
    }
}

impl InterfaceConfig {
    /// Configuration for the given candidate endpoints, defaults elsewhere
    pub fn with_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Callback invoked once per successfully parsed non-empty inbound event,
/// independent of the logger
pub type EventCallback = Box<dyn Fn(&Event) + Send + 'static>;

/// Status flags shared between the façade and the worker thread
#[derive(Debug, Default)]
pub(crate) struct Status {
    pub(crate) connected: AtomicBool,
    pub(crate) running: AtomicBool,
    pub(crate) stop_requested: AtomicBool,
    pub(crate) force_reconnect: AtomicBool,
}

/// Everything the worker thread takes ownership of at start
struct WorkerSeed {
    transport: Box<dyn Transport>,
    callback: Option<EventCallback>,
    request_rx: mpsc::Receiver<PendingRequest>,
}

/// Thread-safe serial request/response interface
pub struct SerialInterface {
    config: InterfaceConfig,
    status: Arc<Status>,
    request_tx: mpsc::Sender<PendingRequest>,
    seed: Mutex<Option<WorkerSeed>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SerialInterface {
    /// Interface over real serial ports
    pub fn new(config: InterfaceConfig) -> Self {
        let transport = SerialTransport {
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout,
        };
        Self::with_transport(config, Box::new(transport))
    }

    /// Interface over a caller-supplied transport
    pub fn with_transport(config: InterfaceConfig, transport: Box<dyn Transport>) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        Self {
            config,
            status: Arc::new(Status::default()),
            request_tx,
            seed: Mutex::new(Some(WorkerSeed {
                transport,
                callback: None,
                request_rx,
            })),
            worker: Mutex::new(None),
        }
    }

    /// Install the inbound-event callback. Must be called before
    /// [`start`](Self::start); afterwards the call is ignored with a warning.
    pub fn on_event(&self, callback: EventCallback) {
        match lock(&self.seed).as_mut() {
            Some(seed) => seed.callback = Some(callback),
            None => warn!("on_event called after start; callback ignored"),
        }
    }

    /// Spawn the dedicated worker thread
    pub fn start(&self) -> Result<(), InterfaceError> {
        let seed = lock(&self.seed)
            .take()
            .ok_or(InterfaceError::AlreadyRunning)?;

        self.status.running.store(true, Ordering::SeqCst);
        let status = Arc::clone(&self.status);
        let worker = Worker::new(
            self.config.clone(),
            seed.transport,
            seed.callback,
            seed.request_rx,
            Arc::clone(&self.status),
        );
        let handle = std::thread::Builder::new()
            .name("uartlink-worker".to_string())
            .spawn(move || {
                worker.run();
                status.running.store(false, Ordering::SeqCst);
            })?;
        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    /// Whether a link is currently open
    pub fn is_connected(&self) -> bool {
        self.status.connected.load(Ordering::SeqCst)
    }

    /// Whether the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.status.running.load(Ordering::SeqCst)
    }

    /// Ask the worker to drop and re-establish the link. Idempotent; observed
    /// at the worker's next iteration boundary, never mid-read.
    pub fn force_reconnect(&self) {
        info!("Force reconnect requested");
        self.status.force_reconnect.store(true, Ordering::SeqCst);
    }

    /// Request a stop and join the worker thread.
    ///
    /// The stop flag is one-way; the worker observes it within one loop
    /// iteration, closes the link, and exits.
    pub fn stop(&self) {
        info!("Stop requested");
        self.status.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = lock(&self.worker).take() {
            if handle.join().is_err() {
                warn!("worker thread panicked during shutdown");
            }
        }
    }

    /// Submit a request and wait for its terminal event.
    ///
    /// Returns [`EventKind::LinkUnavailable`] immediately when no link is
    /// open; nothing is enqueued. Fire-and-forget requests return an
    /// empty-content acknowledgment as soon as they are queued. Otherwise the
    /// caller blocks until the correlated response, a
    /// [`EventKind::ResponseTimeout`], or, should the worker ever fail to
    /// resolve the request, the defensive
    /// [`EventKind::RequestHandlerTimeout`] bound.
    pub fn submit(&self, request: Request) -> Event {
        if !self.is_connected() {
            return Event::now(EventKind::LinkUnavailable);
        }

        let label = request.payload_label();
        let expects_response = request.expects_response();
        // Strictly greater than the full retry budget, so the worker always
        // produces a terminal event first.
        let wait = request.attempt_timeout * request.max_attempts.max(1) + RESPONSE_CLAIM_SLACK;

        let (reply_tx, reply_rx) = mpsc::channel();
        let pending = PendingRequest {
            request,
            reply: reply_tx,
        };
        if self.request_tx.send(pending).is_err() {
            return Event::now(EventKind::LinkUnavailable);
        }

        if !expects_response {
            return Event::now(EventKind::TextResponse {
                content: String::new(),
            });
        }

        match reply_rx.recv_timeout(wait) {
            Ok(event) => event,
            Err(RecvTimeoutError::Disconnected) => Event::now(EventKind::LinkUnavailable),
            Err(RecvTimeoutError::Timeout) => {
                warn!("response for request {label:?} was not claimed within {wait:?}");
                Event::now(EventKind::RequestHandlerTimeout { request: label })
            }
        }
    }
}

impl Drop for SerialInterface {
    fn drop(&mut self) {
        self.status.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }
    }
}
