use std::path::PathBuf;

/// Configuration for an [`HttpsClient`](crate::HttpsClient).
///
/// The defaults mirror the engine tuning the client ships with: a 100 ms
/// poll interval, a 1 s bounded engine wait, a 4.5 s connect timeout, and
/// a 100 B/s over 5 s low-speed abort for transfers that opt into
/// minimum-throughput enforcement.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Verify the peer's TLS certificate.
    pub verify_tls: bool,
    /// CA bundle path used when `verify_tls` is set. `None` uses the
    /// engine's built-in trust store.
    pub ca_file: Option<PathBuf>,
    /// Sleep between poll-worker iterations, in milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound for a single engine wait between drive attempts, in
    /// milliseconds. The worker never blocks indefinitely on the engine.
    pub wait_timeout_ms: u64,
    /// Ceiling on raw header-block accumulation per response. A stream
    /// that never produces a header terminator stops being retained once
    /// it exceeds this many bytes.
    pub max_header_bytes: usize,
    /// Timeout for the connection phase of each transfer, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum redirect hops for requests that follow redirects.
    pub max_redirects: u32,
    /// Abort threshold for minimum-throughput enforcement, in bytes/sec.
    pub low_speed_limit: u32,
    /// Window over which `low_speed_limit` must be violated before the
    /// transfer is aborted, in seconds.
    pub low_speed_time_secs: u64,
    /// Receive buffer size requested from the engine, per transfer.
    pub recv_buffer_size: usize,
    /// DNS cache TTL for the shared cache, in seconds.
    pub dns_cache_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            verify_tls: false,
            ca_file: None,
            poll_interval_ms: 100,
            wait_timeout_ms: 1_000,
            max_header_bytes: 64 * 1024,
            connect_timeout_ms: 4_500,
            max_redirects: 5,
            low_speed_limit: 100,
            low_speed_time_secs: 5,
            recv_buffer_size: 512 * 1024,
            dns_cache_timeout_secs: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.poll_interval_ms, 100);
        assert_eq!(config.wait_timeout_ms, 1_000);
        assert_eq!(config.max_redirects, 5);
        assert!(!config.verify_tls);
        assert!(config.ca_file.is_none());
    }
}
