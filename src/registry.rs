//! Thread-safe mapping from transfer handles to request contexts.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use parking_lot::Mutex;

use crate::context::RequestContext;
use crate::engine::HandleId;
use crate::error::Error;

/// Table of in-flight transfers keyed by engine handle identity.
///
/// Invariant: a handle is present here if and only if its transfer is
/// currently active in the engine. Entries are always removed before
/// the handle is released back to the engine, because engines may
/// reuse handle values.
///
/// All operations take one dedicated lock. Callers must not hold the
/// lock across a completion-handler invocation; handlers may call
/// back into the client (e.g. issue a new request). `remove_take`
/// returns the owned context, so delivery happens lock-free.
pub(crate) struct RequestRegistry {
    inner: Mutex<HashMap<u64, RequestContext>>,
}

impl RequestRegistry {
    pub(crate) fn new() -> Self {
        RequestRegistry {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Register a context under a handle. A duplicate handle is a
    /// programming error and is surfaced, never silently overwritten.
    pub(crate) fn insert(&self, handle: HandleId, context: RequestContext) -> Result<(), Error> {
        match self.inner.lock().entry(handle.raw()) {
            Entry::Occupied(_) => Err(Error::DuplicateHandle(handle)),
            Entry::Vacant(slot) => {
                slot.insert(context);
                Ok(())
            }
        }
    }

    /// Atomically remove and return the context for a handle. `None` is
    /// benign: the engine delivered an event for an already-reclaimed
    /// handle and the caller must ignore it.
    pub(crate) fn remove_take(&self, handle: HandleId) -> Option<RequestContext> {
        self.inner.lock().remove(&handle.raw())
    }

    /// Number of in-flight transfers. Diagnostics only.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Remove and return every entry. Used at shutdown teardown.
    pub(crate) fn drain(&self) -> Vec<(HandleId, RequestContext)> {
        self.inner
            .lock()
            .drain()
            .map(|(raw, context)| (HandleId::from_raw(raw), context))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(id: u64) -> RequestContext {
        let noop = |_: &crate::ClientHandle,
                    _: u64,
                    _: crate::Response,
                    _: crate::TransferOutcome| {};
        RequestContext::new(id, 64 * 1024, Box::new(noop))
    }

    #[test]
    fn insert_then_remove_take() {
        let registry = RequestRegistry::new();
        registry.insert(HandleId::from_raw(1), context(10)).unwrap();
        assert_eq!(registry.len(), 1);

        let ctx = registry.remove_take(HandleId::from_raw(1)).unwrap();
        assert_eq!(ctx.request_id, 10);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn duplicate_handle_is_an_error() {
        let registry = RequestRegistry::new();
        registry.insert(HandleId::from_raw(3), context(1)).unwrap();
        let err = registry.insert(HandleId::from_raw(3), context(2)).unwrap_err();
        assert!(matches!(err, Error::DuplicateHandle(h) if h.raw() == 3));
        // The original entry is untouched.
        let ctx = registry.remove_take(HandleId::from_raw(3)).unwrap();
        assert_eq!(ctx.request_id, 1);
    }

    #[test]
    fn remove_take_missing_is_none() {
        let registry = RequestRegistry::new();
        assert!(registry.remove_take(HandleId::from_raw(9)).is_none());
    }

    #[test]
    fn drain_empties_the_table() {
        let registry = RequestRegistry::new();
        registry.insert(HandleId::from_raw(1), context(1)).unwrap();
        registry.insert(HandleId::from_raw(2), context(2)).unwrap();

        let mut drained = registry.drain();
        drained.sort_by_key(|(h, _)| h.raw());
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].1.request_id, 1);
        assert_eq!(registry.len(), 0);
    }
}
