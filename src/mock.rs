//! Scripted transfer engine for tests.
//!
//! `MockEngine` plays back a script: each started transfer consumes the
//! next entry, stays "running" for a configurable number of drive
//! calls, then feeds its header and body chunks through the byte sinks
//! and completes with the scripted outcome. Deterministic and entirely
//! in-process, which is what the integration suite runs against.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::engine::{ByteSinks, HandleId, TransferEngine, TransferOutcome, TransferSpec};
use crate::error::EngineError;

/// Script entry for one transfer.
pub struct MockTransfer {
    /// Header bytes, delivered chunk by chunk in order.
    pub header_chunks: Vec<Vec<u8>>,
    /// Body bytes, delivered chunk by chunk in order.
    pub body_chunks: Vec<Vec<u8>>,
    /// Outcome reported at completion.
    pub outcome: TransferOutcome,
    /// Number of `drive()` calls the transfer stays running before its
    /// data is delivered and it completes.
    pub drive_rounds: u32,
    /// Fail `start_transfer` instead of starting.
    pub fail_start: bool,
}

impl MockTransfer {
    /// A transfer that succeeds immediately with the given raw header
    /// block and body.
    pub fn success(raw_headers: &[u8], body: &[u8]) -> Self {
        MockTransfer {
            header_chunks: vec![raw_headers.to_vec()],
            body_chunks: vec![body.to_vec()],
            outcome: TransferOutcome::Success,
            drive_rounds: 0,
            fail_start: false,
        }
    }

    /// A transfer that fails `start_transfer`.
    pub fn failing_start() -> Self {
        MockTransfer {
            header_chunks: Vec::new(),
            body_chunks: Vec::new(),
            outcome: TransferOutcome::Success,
            drive_rounds: 0,
            fail_start: true,
        }
    }

    /// Replace the outcome.
    pub fn outcome(mut self, outcome: TransferOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Keep the transfer running for this many drive calls.
    pub fn drive_rounds(mut self, rounds: u32) -> Self {
        self.drive_rounds = rounds;
        self
    }

    /// Replace the header chunking.
    pub fn header_chunks(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.header_chunks = chunks;
        self
    }

    /// Replace the body chunking.
    pub fn body_chunks(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.body_chunks = chunks;
        self
    }
}

/// Observable counters, cloneable before the engine moves onto the
/// worker thread.
#[derive(Clone, Default)]
pub struct MockCounters {
    started: Arc<AtomicUsize>,
    failed_starts: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl MockCounters {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn failed_starts(&self) -> usize {
        self.failed_starts.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

struct ActiveTransfer {
    id: u64,
    transfer: MockTransfer,
    sinks: ByteSinks,
    rounds_left: u32,
}

/// Scripted [`TransferEngine`].
///
/// Transfers consume script entries in submission order; starting a
/// transfer with an exhausted script is a setup error.
pub struct MockEngine {
    script: VecDeque<MockTransfer>,
    active: Vec<ActiveTransfer>,
    completed: Vec<(HandleId, TransferOutcome)>,
    next_id: u64,
    counters: MockCounters,
}

impl MockEngine {
    pub fn new(script: Vec<MockTransfer>) -> Self {
        MockEngine {
            script: script.into(),
            active: Vec::new(),
            completed: Vec::new(),
            next_id: 1,
            counters: MockCounters::default(),
        }
    }

    /// Counters handle to keep on the test thread.
    pub fn counters(&self) -> MockCounters {
        self.counters.clone()
    }
}

impl TransferEngine for MockEngine {
    fn start_transfer(
        &mut self,
        _spec: TransferSpec,
        sinks: ByteSinks,
    ) -> Result<HandleId, EngineError> {
        let transfer = self
            .script
            .pop_front()
            .ok_or_else(|| EngineError::Setup("mock script exhausted".to_string()))?;
        if transfer.fail_start {
            self.counters.failed_starts.fetch_add(1, Ordering::SeqCst);
            return Err(EngineError::Setup("scripted start failure".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.counters.started.fetch_add(1, Ordering::SeqCst);
        let rounds_left = transfer.drive_rounds;
        self.active.push(ActiveTransfer {
            id,
            transfer,
            sinks,
            rounds_left,
        });
        Ok(HandleId::from_raw(id))
    }

    fn drive(&mut self) -> Result<u32, EngineError> {
        let mut still_active = Vec::new();
        for mut active in self.active.drain(..) {
            if active.rounds_left > 0 {
                active.rounds_left -= 1;
                still_active.push(active);
                continue;
            }
            for chunk in &active.transfer.header_chunks {
                (active.sinks.header)(chunk);
            }
            for chunk in &active.transfer.body_chunks {
                (active.sinks.body)(chunk);
            }
            self.completed
                .push((HandleId::from_raw(active.id), active.transfer.outcome.clone()));
        }
        self.active = still_active;
        Ok(self.active.len() as u32)
    }

    fn wait_for_activity(&mut self, _timeout: Duration) -> Result<(), EngineError> {
        Ok(())
    }

    fn drain_completed(&mut self) -> Vec<(HandleId, TransferOutcome)> {
        std::mem::take(&mut self.completed)
    }

    fn release(&mut self, _handle: HandleId) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink_pair() -> (ByteSinks, Arc<parking_lot::Mutex<(Vec<u8>, Vec<u8>)>>) {
        let collected = Arc::new(parking_lot::Mutex::new((Vec::new(), Vec::new())));
        let h = collected.clone();
        let b = collected.clone();
        let sinks = ByteSinks {
            header: Box::new(move |chunk| h.lock().0.extend_from_slice(chunk)),
            body: Box::new(move |chunk| b.lock().1.extend_from_slice(chunk)),
        };
        (sinks, collected)
    }

    fn spec() -> TransferSpec {
        TransferSpec {
            method: "GET".to_string(),
            uri: "https://example.com/".to_string(),
            headers: Vec::new(),
            body: bytes::Bytes::new(),
            timeout_ms: 0,
            follow_redirects: false,
            enforce_min_speed: false,
        }
    }

    #[test]
    fn plays_back_script_and_completes() {
        let mut engine = MockEngine::new(vec![MockTransfer::success(
            b"HTTP/1.1 200 OK\r\n\r\n",
            b"body",
        )]);
        let (sinks, collected) = sink_pair();
        let handle = engine.start_transfer(spec(), sinks).unwrap();

        assert_eq!(engine.drive().unwrap(), 0);
        let done = engine.drain_completed();
        assert_eq!(done, vec![(handle, TransferOutcome::Success)]);

        let data = collected.lock();
        assert_eq!(data.0, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(data.1, b"body");
    }

    #[test]
    fn drive_rounds_delay_completion() {
        let mut engine = MockEngine::new(vec![
            MockTransfer::success(b"HTTP/1.1 200 OK\r\n\r\n", b"").drive_rounds(2),
        ]);
        let (sinks, _collected) = sink_pair();
        engine.start_transfer(spec(), sinks).unwrap();

        assert_eq!(engine.drive().unwrap(), 1);
        assert_eq!(engine.drive().unwrap(), 1);
        assert_eq!(engine.drive().unwrap(), 0);
        assert_eq!(engine.drain_completed().len(), 1);
    }

    #[test]
    fn exhausted_script_is_a_setup_error() {
        let mut engine = MockEngine::new(vec![]);
        let (sinks, _collected) = sink_pair();
        assert!(engine.start_transfer(spec(), sinks).is_err());
    }
}
