//! The transfer-engine seam.
//!
//! The dispatcher consumes a multi-connection transfer engine through
//! this trait: start a transfer, drive the whole active set, wait (with
//! a bound) for activity, drain completion events, release a handle.
//! The shipped binding is [`CurlMultiEngine`](crate::curl_multi::CurlMultiEngine);
//! tests use [`MockEngine`](crate::mock::MockEngine).
//!
//! An engine instance lives entirely on the poll-worker thread. It is
//! constructed there and never shared, so implementations need no
//! internal synchronization.

use std::time::Duration;

use bytes::Bytes;

use crate::error::EngineError;

/// Opaque identity of one in-flight transfer, assigned by the engine.
///
/// Engines may reuse a value after [`release`](TransferEngine::release),
/// so any external mapping keyed by a `HandleId` must drop its entry
/// before the handle goes back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl HandleId {
    /// Build a handle id from the engine's raw identity value.
    pub fn from_raw(raw: u64) -> Self {
        HandleId(raw)
    }

    /// Raw identity value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Byte-sink callback invoked by the engine as data arrives, in
/// arrival order.
pub type ByteSink = Box<dyn FnMut(&[u8]) + Send>;

/// The two per-transfer data channels an engine delivers into.
pub struct ByteSinks {
    /// Receives raw header-block bytes.
    pub header: ByteSink,
    /// Receives response body bytes.
    pub body: ByteSink,
}

/// Everything the engine needs to configure one transfer.
#[derive(Clone, Debug)]
pub struct TransferSpec {
    pub method: String,
    pub uri: String,
    /// Raw header lines, in order.
    pub headers: Vec<String>,
    pub body: Bytes,
    /// 0 means no per-request timeout.
    pub timeout_ms: u64,
    pub follow_redirects: bool,
    pub enforce_min_speed: bool,
}

/// Engine-reported end state of a transfer.
///
/// Anything other than `Success` is passed through to the completion
/// handler untranslated; detailed error-code taxonomy belongs to the
/// engine, not this layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The transfer ran to completion.
    Success,
    /// Per-request timeout or low-speed abort.
    TimedOut,
    /// Any other engine-reported failure, message passed through.
    Failed {
        message: String,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Success)
    }
}

/// A multi-connection transfer engine.
pub trait TransferEngine {
    /// Create, configure, and submit one transfer into the active set.
    /// Non-blocking. On error the transfer was not started and no
    /// completion event will ever be reported for it.
    fn start_transfer(
        &mut self,
        spec: TransferSpec,
        sinks: ByteSinks,
    ) -> Result<HandleId, EngineError>;

    /// Drive all active transfers once; returns how many are still
    /// running. Byte sinks are invoked from inside this call.
    fn drive(&mut self) -> Result<u32, EngineError>;

    /// Block until the engine has activity to process, or the timeout
    /// elapses, whichever comes first.
    fn wait_for_activity(&mut self, timeout: Duration) -> Result<(), EngineError>;

    /// Drain all completion events reported since the last drain, in
    /// engine delivery order. Each handle appears at most once.
    fn drain_completed(&mut self) -> Vec<(HandleId, TransferOutcome)>;

    /// Tear down a transfer handle and return it to the engine. Safe to
    /// call for a handle that already completed; must be called exactly
    /// once per started transfer.
    fn release(&mut self, handle: HandleId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_success_flag() {
        assert!(TransferOutcome::Success.is_success());
        assert!(!TransferOutcome::TimedOut.is_success());
        assert!(!TransferOutcome::Failed {
            message: "connection refused".to_string()
        }
        .is_success());
    }

    #[test]
    fn handle_id_round_trip() {
        let id = HandleId::from_raw(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(id, HandleId::from_raw(42));
    }
}
