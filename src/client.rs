//! Client facade: lifecycle, submission, and the completion seam.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::warn;

use crate::config::ClientConfig;
use crate::context::RequestContext;
use crate::curl_multi::CurlMultiEngine;
use crate::engine::{TransferEngine, TransferOutcome, TransferSpec};
use crate::error::Error;
use crate::metrics;
use crate::registry::RequestRegistry;
use crate::request::Request;
use crate::response::Response;
use crate::worker::PollWorker;

/// Caller-supplied completion callback, invoked exactly once per
/// accepted request that reaches engine completion, on the worker
/// thread, with the assembled response and the engine's outcome.
///
/// Consumed by value on delivery; a handler instance cannot fire twice.
/// Implemented for any matching `FnOnce` closure, so most callers never
/// name this trait.
pub trait CompletionHandler: Send + 'static {
    fn on_complete(
        self: Box<Self>,
        client: &ClientHandle,
        request_id: u64,
        response: Response,
        outcome: TransferOutcome,
    );
}

impl<F> CompletionHandler for F
where
    F: FnOnce(&ClientHandle, u64, Response, TransferOutcome) + Send + 'static,
{
    fn on_complete(
        self: Box<Self>,
        client: &ClientHandle,
        request_id: u64,
        response: Response,
        outcome: TransferOutcome,
    ) {
        (*self)(client, request_id, response, outcome)
    }
}

/// One queued request on its way to the poll worker.
pub(crate) struct Submission {
    pub(crate) spec: TransferSpec,
    pub(crate) context: RequestContext,
}

/// Client state shared between the facade, the poll worker, and every
/// completion handler. Lives as long as any of them does, which is what
/// keeps the client alive while requests are in flight.
///
/// Lock order: the facade's worker slot, then `tx`. The registry lock
/// is never held together with either.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) registry: RequestRegistry,
    pub(crate) done: AtomicBool,
    tx: Mutex<Option<Sender<Submission>>>,
}

impl Shared {
    fn submit(&self, request: Request, handler: Box<dyn CompletionHandler>) -> Result<(), Error> {
        if self.done.load(Ordering::Acquire) {
            return Err(Error::Stopped);
        }
        let (request_id, spec) = request.into_spec();
        let context = RequestContext::new(request_id, self.config.max_header_bytes, handler);
        let tx = self.tx.lock();
        let tx = tx.as_ref().ok_or(Error::Stopped)?;
        tx.send(Submission { spec, context })
            .map_err(|_| Error::Stopped)?;
        metrics::REQUESTS_SUBMITTED.increment();
        Ok(())
    }
}

/// Asynchronous HTTPS client.
///
/// One background thread per client drives the transfer engine and
/// delivers completions; any number of producer threads may call
/// [`send`](HttpsClient::send) concurrently. `send` never blocks on
/// network I/O.
///
/// `stop()` joins the worker and drops all in-flight transfers without
/// invoking their handlers; it is also run on `Drop`. There is no
/// per-request cancellation; callers needing it should filter late
/// completions by request id.
pub struct HttpsClient {
    shared: Arc<Shared>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl HttpsClient {
    /// Create a client. No thread is spawned until [`start`](Self::start).
    pub fn new(config: ClientConfig) -> Self {
        HttpsClient {
            shared: Arc::new(Shared {
                config,
                registry: RequestRegistry::new(),
                done: AtomicBool::new(false),
                tx: Mutex::new(None),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start the poll worker with the default curl-multi engine.
    /// Idempotent: a second call while running is a no-op.
    pub fn start(&self) {
        let config = self.shared.config.clone();
        self.start_with_engine(move || CurlMultiEngine::new(config));
    }

    /// Start the poll worker with a caller-built transfer engine.
    ///
    /// The factory runs on the worker thread, so the engine never
    /// crosses threads and does not need to be `Send`. This is also the
    /// injection point for [`MockEngine`](crate::mock::MockEngine) in
    /// tests.
    pub fn start_with_engine<E, F>(&self, engine: F)
    where
        E: TransferEngine + 'static,
        F: FnOnce() -> E + Send + 'static,
    {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            return;
        }

        self.shared.done.store(false, Ordering::Release);
        let (tx, rx) = crossbeam_channel::unbounded();
        *self.shared.tx.lock() = Some(tx);

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("httpline-worker".to_string())
            .spawn(move || PollWorker::new(engine(), rx, shared).run());
        match spawned {
            Ok(handle) => *slot = Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to spawn poll worker");
                *self.shared.tx.lock() = None;
            }
        }
    }

    /// Stop the poll worker and drop all in-flight transfers.
    ///
    /// Blocks until the worker has exited; idempotent and safe to call
    /// without a prior `start` or `send`. Must be called from a thread
    /// other than the worker (handlers get a [`ClientHandle`], which
    /// deliberately has no `stop`).
    pub fn stop(&self) {
        let mut slot = self.worker.lock();
        self.shared.done.store(true, Ordering::Release);
        // Closing the channel both wakes nothing (the worker polls) and
        // makes any racing send fail cleanly.
        *self.shared.tx.lock() = None;
        if let Some(handle) = slot.take()
            && handle.join().is_err()
        {
            warn!("poll worker thread panicked");
        }
    }

    /// Enqueue a request. Fire-and-forget: the completion handler is
    /// invoked asynchronously on the worker thread, exactly once,
    /// unless the engine fails to create the transfer, in which case
    /// the request is dropped (logged and counted, no callback).
    ///
    /// Fails with [`Error::Stopped`] if the client is not running.
    pub fn send(&self, request: Request, handler: impl CompletionHandler) -> Result<(), Error> {
        self.shared.submit(request, Box::new(handler))
    }

    /// A cheap handle for issuing requests from other threads or from
    /// inside completion handlers.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            shared: self.shared.clone(),
        }
    }

    /// Number of currently in-flight transfers. Diagnostics only.
    pub fn in_flight(&self) -> usize {
        self.shared.registry.len()
    }
}

impl Drop for HttpsClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Shared handle to a running [`HttpsClient`].
///
/// Handed to completion handlers (which may re-enter `send` without
/// deadlocking) and cloneable across producer threads. Holding one
/// keeps the client's shared state alive, but only the owning
/// `HttpsClient` can stop the worker.
#[derive(Clone)]
pub struct ClientHandle {
    shared: Arc<Shared>,
}

impl ClientHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        ClientHandle { shared }
    }

    /// Enqueue a request. See [`HttpsClient::send`].
    pub fn send(&self, request: Request, handler: impl CompletionHandler) -> Result<(), Error> {
        self.shared.submit(request, Box::new(handler))
    }

    /// Number of currently in-flight transfers.
    pub fn in_flight(&self) -> usize {
        self.shared.registry.len()
    }
}
