//! Transfer engine binding over libcurl's multi interface.
//!
//! Owns one multi handle plus the per-client share handle that pools
//! the DNS cache across transfers; the share's lock callbacks serialize
//! on the process-wide lock in [`global`](crate::global), so every
//! client in the process shares safely. The whole engine lives on the
//! poll-worker thread.

use std::collections::HashMap;
use std::os::raw::{c_int, c_void};
use std::time::Duration;

use curl::easy::{Easy2, Handler, List, WriteError};
use curl::multi::{Easy2Handle, Multi};
use tracing::warn;

use crate::config::ClientConfig;
use crate::engine::{ByteSinks, HandleId, TransferEngine, TransferOutcome, TransferSpec};
use crate::error::EngineError;
use crate::global;

/// Routes libcurl's header and body write callbacks into the byte sinks.
struct SinkHandler {
    sinks: ByteSinks,
}

impl Handler for SinkHandler {
    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        (self.sinks.body)(data);
        Ok(data.len())
    }

    fn header(&mut self, data: &[u8]) -> bool {
        (self.sinks.header)(data);
        true
    }
}

extern "C" fn share_lock_cb(
    _handle: *mut curl_sys::CURL,
    _data: c_int,
    _access: c_int,
    _userptr: *mut c_void,
) {
    global::shared_cache_lock();
}

extern "C" fn share_unlock_cb(_handle: *mut curl_sys::CURL, _data: c_int, _userptr: *mut c_void) {
    global::shared_cache_unlock();
}

/// A `CURLSH` share handle pooling the DNS cache. The raw pointer is
/// only ever used from the worker thread; the lock callbacks make the
/// cache itself safe for libcurl to touch from anywhere.
struct SharedCache {
    raw: *mut curl_sys::CURLSH,
}

// The share handle is moved with the engine onto the worker thread and
// never aliased; concurrent cache access inside libcurl is guarded by
// the lock callbacks.
unsafe impl Send for SharedCache {}

impl SharedCache {
    fn new() -> Option<SharedCache> {
        unsafe {
            let raw = curl_sys::curl_share_init();
            if raw.is_null() {
                return None;
            }
            curl_sys::curl_share_setopt(
                raw,
                curl_sys::CURLSHOPT_SHARE,
                curl_sys::CURL_LOCK_DATA_DNS,
            );
            curl_sys::curl_share_setopt(
                raw,
                curl_sys::CURLSHOPT_LOCKFUNC,
                share_lock_cb
                    as extern "C" fn(*mut curl_sys::CURL, c_int, c_int, *mut c_void),
            );
            curl_sys::curl_share_setopt(
                raw,
                curl_sys::CURLSHOPT_UNLOCKFUNC,
                share_unlock_cb as extern "C" fn(*mut curl_sys::CURL, c_int, *mut c_void),
            );
            Some(SharedCache { raw })
        }
    }
}

impl Drop for SharedCache {
    fn drop(&mut self) {
        unsafe {
            curl_sys::curl_share_cleanup(self.raw);
        }
    }
}

/// [`TransferEngine`] implementation over `curl::multi::Multi`.
pub struct CurlMultiEngine {
    // Declared before `multi` so active easy handles drop first.
    active: HashMap<u64, Easy2Handle<SinkHandler>>,
    multi: Multi,
    share: Option<SharedCache>,
    next_token: u64,
    config: ClientConfig,
}

impl CurlMultiEngine {
    pub fn new(config: ClientConfig) -> Self {
        global::engine_init(curl::init);
        // A null share handle is tolerated: transfers run without the
        // pooled DNS cache.
        let share = SharedCache::new();
        if share.is_none() {
            warn!("curl share handle unavailable; DNS cache pooling disabled");
        }
        CurlMultiEngine {
            active: HashMap::new(),
            multi: Multi::new(),
            share,
            next_token: 1,
            config,
        }
    }

    fn build_easy(
        &self,
        spec: &TransferSpec,
        sinks: ByteSinks,
    ) -> Result<Easy2<SinkHandler>, EngineError> {
        fn setup(e: curl::Error) -> EngineError {
            EngineError::Setup(e.to_string())
        }

        let mut easy = Easy2::new(SinkHandler { sinks });
        easy.custom_request(&spec.method).map_err(setup)?;
        easy.url(&spec.uri).map_err(setup)?;
        easy.signal(false).map_err(setup)?;
        easy.buffer_size(self.config.recv_buffer_size)
            .map_err(setup)?;
        easy.connect_timeout(Duration::from_millis(self.config.connect_timeout_ms))
            .map_err(setup)?;

        let mut list = List::new();
        for line in &spec.headers {
            list.append(line).map_err(setup)?;
        }
        // Suppress the 100-continue handshake.
        list.append("Expect:").map_err(setup)?;
        easy.http_headers(list).map_err(setup)?;

        if !spec.body.is_empty() {
            easy.post(true).map_err(setup)?;
            easy.post_field_size(spec.body.len() as u64).map_err(setup)?;
            easy.post_fields_copy(&spec.body).map_err(setup)?;
        }

        if spec.timeout_ms > 0 {
            easy.timeout(Duration::from_millis(spec.timeout_ms))
                .map_err(setup)?;
        }
        if spec.follow_redirects {
            easy.follow_location(true).map_err(setup)?;
            easy.max_redirections(self.config.max_redirects)
                .map_err(setup)?;
        }
        if spec.enforce_min_speed {
            easy.low_speed_limit(self.config.low_speed_limit)
                .map_err(setup)?;
            easy.low_speed_time(Duration::from_secs(self.config.low_speed_time_secs))
                .map_err(setup)?;
        }

        if self.config.verify_tls {
            easy.ssl_verify_peer(true).map_err(setup)?;
            if let Some(ca_file) = &self.config.ca_file {
                easy.cainfo(ca_file).map_err(setup)?;
            }
        } else {
            easy.ssl_verify_peer(false).map_err(setup)?;
        }

        if let Some(share) = &self.share {
            // No safe binding for CURLOPT_SHARE; the pointers are valid
            // for the lifetimes of `easy` and the engine respectively.
            unsafe {
                curl_sys::curl_easy_setopt(easy.raw(), curl_sys::CURLOPT_SHARE, share.raw);
            }
            easy.dns_cache_timeout(Duration::from_secs(self.config.dns_cache_timeout_secs))
                .map_err(setup)?;
        }

        Ok(easy)
    }
}

impl TransferEngine for CurlMultiEngine {
    fn start_transfer(
        &mut self,
        spec: TransferSpec,
        sinks: ByteSinks,
    ) -> Result<HandleId, EngineError> {
        let easy = self.build_easy(&spec, sinks)?;
        let mut handle = self
            .multi
            .add2(easy)
            .map_err(|e| EngineError::Setup(e.to_string()))?;
        let token = self.next_token;
        self.next_token += 1;
        handle
            .set_token(token as usize)
            .map_err(|e| EngineError::Setup(e.to_string()))?;
        self.active.insert(token, handle);
        Ok(HandleId::from_raw(token))
    }

    fn drive(&mut self) -> Result<u32, EngineError> {
        self.multi
            .perform()
            .map_err(|e| EngineError::Drive(e.to_string()))
    }

    fn wait_for_activity(&mut self, timeout: Duration) -> Result<(), EngineError> {
        self.multi
            .wait(&mut [], timeout)
            .map(|_| ())
            .map_err(|e| EngineError::Wait(e.to_string()))
    }

    fn drain_completed(&mut self) -> Vec<(HandleId, TransferOutcome)> {
        let mut done = Vec::new();
        self.multi.messages(|message| {
            if let Some(result) = message.result() {
                match message.token() {
                    Ok(token) => done.push((HandleId::from_raw(token as u64), outcome(result))),
                    Err(e) => warn!(error = %e, "completion event without a token"),
                }
            }
        });
        done
    }

    fn release(&mut self, handle: HandleId) {
        if let Some(easy) = self.active.remove(&handle.raw())
            && let Err(e) = self.multi.remove2(easy)
        {
            warn!(error = %e, "failed to detach transfer from multi handle");
        }
    }
}

impl Drop for CurlMultiEngine {
    fn drop(&mut self) {
        for (_, easy) in self.active.drain() {
            let _ = self.multi.remove2(easy);
        }
        // libcurl's global state is process-permanent in this binding;
        // the refcount discipline is kept so a future binding with real
        // teardown slots in.
        global::engine_teardown(|| {});
    }
}

fn outcome(result: Result<(), curl::Error>) -> TransferOutcome {
    match result {
        Ok(()) => TransferOutcome::Success,
        Err(e) if e.is_operation_timedout() => TransferOutcome::TimedOut,
        Err(e) => TransferOutcome::Failed {
            message: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_mapping() {
        assert_eq!(outcome(Ok(())), TransferOutcome::Success);

        let timeout = curl::Error::new(curl_sys::CURLE_OPERATION_TIMEDOUT);
        assert_eq!(outcome(Err(timeout)), TransferOutcome::TimedOut);

        let refused = curl::Error::new(curl_sys::CURLE_COULDNT_CONNECT);
        assert!(matches!(
            outcome(Err(refused)),
            TransferOutcome::Failed { .. }
        ));
    }
}
