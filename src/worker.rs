//! The background poll loop.
//!
//! One worker thread per client: it picks up queued submissions,
//! drives the engine's active set until nothing is runnable, then
//! drains completion events and delivers them synchronously. The
//! state machine is `Stopped → Running → Draining → Stopped`; the
//! `Running → Draining` edge is the shutdown flag, observed at the top
//! of every iteration and between drive attempts.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{debug, info, trace, warn};

use crate::client::{ClientHandle, Shared, Submission};
use crate::context::RequestContext;
use crate::engine::{ByteSinks, TransferEngine};
use crate::metrics;

pub(crate) struct PollWorker<E: TransferEngine> {
    engine: E,
    rx: Receiver<Submission>,
    shared: Arc<Shared>,
    client: ClientHandle,
}

impl<E: TransferEngine> PollWorker<E> {
    pub(crate) fn new(engine: E, rx: Receiver<Submission>, shared: Arc<Shared>) -> Self {
        let client = ClientHandle::new(shared.clone());
        PollWorker {
            engine,
            rx,
            shared,
            client,
        }
    }

    pub(crate) fn run(mut self) {
        debug!("poll worker running");
        let poll_interval = Duration::from_millis(self.shared.config.poll_interval_ms);
        let wait_timeout = Duration::from_millis(self.shared.config.wait_timeout_ms);

        loop {
            thread::sleep(poll_interval);
            if self.shared.done.load(Ordering::Acquire) {
                break;
            }
            self.accept_submissions();
            self.drive_until_idle(wait_timeout);
            self.deliver_completions();
        }

        self.drain_on_shutdown();
        info!("https client stopped");
    }

    /// Start transfers for everything the producers queued since the
    /// last iteration. An engine setup failure drops that request (no
    /// completion will ever be delivered for it) and touches nothing
    /// else.
    fn accept_submissions(&mut self) {
        while let Ok(Submission { spec, context }) = self.rx.try_recv() {
            let request_id = context.request_id;
            let sinks = byte_sinks(&context);
            match self.engine.start_transfer(spec, sinks) {
                Ok(handle) => {
                    if let Err(e) = self.shared.registry.insert(handle, context) {
                        warn!(request_id, error = %e, "dropping request");
                        self.engine.release(handle);
                        metrics::REQUESTS_DROPPED.increment();
                    }
                }
                Err(e) => {
                    warn!(request_id, error = %e, "transfer setup failed; request dropped");
                    metrics::REQUESTS_DROPPED.increment();
                }
            }
        }
    }

    /// Drive the active set until the engine reports zero running
    /// transfers, blocking between attempts only via the engine's own
    /// bounded wait. New submissions are picked up between attempts,
    /// and the shutdown flag short-circuits the loop so `stop()` never
    /// waits behind a slow transfer.
    fn drive_until_idle(&mut self, wait_timeout: Duration) {
        loop {
            let running = match self.engine.drive() {
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "engine drive failed");
                    break;
                }
            };
            if running == 0 || self.shared.done.load(Ordering::Acquire) {
                break;
            }
            if let Err(e) = self.engine.wait_for_activity(wait_timeout) {
                warn!(error = %e, "engine wait failed");
                break;
            }
            self.accept_submissions();
        }
    }

    /// Drain completion events and deliver each one. The registry entry
    /// is removed before the handle is released (handle values may be
    /// reused by the engine), and the registry lock is never held
    /// across the handler call; the context is owned here.
    fn deliver_completions(&mut self) {
        for (handle, outcome) in self.engine.drain_completed() {
            match self.shared.registry.remove_take(handle) {
                Some(context) => {
                    let RequestContext {
                        request_id,
                        accum,
                        handler,
                    } = context;
                    let response = accum.lock().take_response();
                    if !outcome.is_success() {
                        metrics::TRANSFERS_FAILED.increment();
                    }
                    trace!(request_id, "transfer complete");
                    handler.on_complete(&self.client, request_id, response, outcome);
                    metrics::REQUESTS_COMPLETED.increment();
                }
                // Benign: the context was already reclaimed. Still hand
                // the handle back.
                None => trace!("completion event for unknown handle"),
            }
            self.engine.release(handle);
        }
    }

    /// Draining state: every in-flight transfer is torn down without a
    /// callback, then the engine itself is dropped on this thread.
    fn drain_on_shutdown(&mut self) {
        for (handle, context) in self.shared.registry.drain() {
            debug!(
                request_id = context.request_id,
                "dropping in-flight transfer at shutdown"
            );
            self.engine.release(handle);
        }
    }
}

/// Build the engine-facing byte sinks for one transfer. Both capture
/// the context's shared accumulator; header bytes go through the
/// incremental parser, body bytes append verbatim.
fn byte_sinks(context: &RequestContext) -> ByteSinks {
    let header_accum = context.accum.clone();
    let body_accum = context.accum.clone();
    ByteSinks {
        header: Box::new(move |chunk| header_accum.lock().parser.append(chunk)),
        body: Box::new(move |chunk| {
            body_accum.lock().body.extend_from_slice(chunk);
            metrics::RESPONSE_BYTES.add(chunk.len() as u64);
        }),
    }
}
