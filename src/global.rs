//! Process-wide engine state.
//!
//! Two pieces of state span every client instance and every worker
//! thread in the process:
//!
//! - the shared-cache lock, which the engine invokes around accesses to
//!   its cross-connection caches (DNS, TLS sessions). The engine's
//!   callback contract is guardless lock/unlock pairs callable from any
//!   thread, so this is a raw mutex rather than a guard-based one.
//! - the refcounted global init gate: the first acquire performs engine
//!   global setup, the last release performs teardown. Safe under
//!   concurrent first-time initialization from multiple clients.

use parking_lot::Mutex;
use parking_lot::RawMutex;
use parking_lot::lock_api::RawMutex as _;

static SHARED_CACHE_LOCK: RawMutex = RawMutex::INIT;

static ENGINE_REFS: Mutex<u64> = Mutex::new(0);

/// Acquire the shared-cache lock. Blocks until available. Not
/// reentrant: the engine never nests acquisitions.
pub(crate) fn shared_cache_lock() {
    SHARED_CACHE_LOCK.lock();
}

/// Release the shared-cache lock. Must only be called by the thread
/// that currently holds it; the engine's callback contract guarantees
/// paired calls.
pub(crate) fn shared_cache_unlock() {
    unsafe { SHARED_CACHE_LOCK.unlock() }
}

/// Increment the engine global-init refcount, running `setup` if this
/// is the first reference in the process.
pub(crate) fn engine_init(setup: impl FnOnce()) {
    let mut refs = ENGINE_REFS.lock();
    if *refs == 0 {
        setup();
    }
    *refs += 1;
}

/// Decrement the engine global-init refcount, running `teardown` when
/// the last reference goes away. Extra releases are ignored.
pub(crate) fn engine_teardown(teardown: impl FnOnce()) {
    let mut refs = ENGINE_REFS.lock();
    match *refs {
        0 => {}
        1 => {
            *refs = 0;
            teardown();
        }
        _ => *refs -= 1,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn init_and_teardown_fire_once_per_generation() {
        // The refcount is process-global, so this test runs a full
        // generation on its own: every acquire is matched here.
        static SETUPS: AtomicU32 = AtomicU32::new(0);
        static TEARDOWNS: AtomicU32 = AtomicU32::new(0);

        let setups_before = SETUPS.load(Ordering::SeqCst);
        engine_init(|| {
            SETUPS.fetch_add(1, Ordering::SeqCst);
        });
        engine_init(|| {
            SETUPS.fetch_add(1, Ordering::SeqCst);
        });
        // Nested acquire does not re-run setup.
        assert!(SETUPS.load(Ordering::SeqCst) <= setups_before + 1);

        engine_teardown(|| {
            TEARDOWNS.fetch_add(1, Ordering::SeqCst);
        });
        engine_teardown(|| {
            TEARDOWNS.fetch_add(1, Ordering::SeqCst);
        });
    }

    #[test]
    fn shared_cache_lock_excludes_other_threads() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        shared_cache_lock();
        let (tx, rx) = mpsc::channel();
        let t = thread::spawn(move || {
            shared_cache_lock();
            tx.send(()).unwrap();
            shared_cache_unlock();
        });
        // The spawned thread must be blocked while we hold the lock.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        shared_cache_unlock();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        t.join().unwrap();
    }
}
