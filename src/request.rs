//! Request snapshot and builder.

use bytes::Bytes;

use crate::engine::TransferSpec;

/// An outgoing HTTP(S) request, immutable once submitted.
///
/// Header lines are kept verbatim and in insertion order; duplicate
/// values are allowed and preserved. The request id is caller-assigned
/// and uninterpreted; it is handed back unchanged to the completion
/// handler so callers can correlate responses.
#[derive(Clone, Debug)]
pub struct Request {
    id: u64,
    method: String,
    uri: String,
    headers: Vec<String>,
    body: Bytes,
    timeout_ms: u64,
    follow_redirects: bool,
    enforce_min_speed: bool,
}

impl Request {
    /// Start building a request.
    pub fn builder(id: u64, method: &str, uri: &str) -> RequestBuilder {
        RequestBuilder {
            id,
            method: method.to_string(),
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
            timeout_ms: 0,
            follow_redirects: false,
            enforce_min_speed: false,
        }
    }

    /// Caller-assigned request id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// HTTP method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Target URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Raw header lines, in insertion order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Split into the id and the engine-facing transfer spec.
    pub(crate) fn into_spec(self) -> (u64, TransferSpec) {
        (
            self.id,
            TransferSpec {
                method: self.method,
                uri: self.uri,
                headers: self.headers,
                body: self.body,
                timeout_ms: self.timeout_ms,
                follow_redirects: self.follow_redirects,
                enforce_min_speed: self.enforce_min_speed,
            },
        )
    }
}

/// Builder for a [`Request`].
pub struct RequestBuilder {
    id: u64,
    method: String,
    uri: String,
    headers: Vec<String>,
    body: Bytes,
    timeout_ms: u64,
    follow_redirects: bool,
    enforce_min_speed: bool,
}

impl RequestBuilder {
    /// Append a raw header line (`"Name: value"`). Order is preserved.
    pub fn header(mut self, line: &str) -> Self {
        self.headers.push(line.to_string());
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Per-request timeout in milliseconds. 0 means no timeout.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Follow redirect responses, up to the configured hop limit.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Abort the transfer if throughput stays below the configured
    /// low-speed threshold.
    pub fn enforce_min_speed(mut self, enforce: bool) -> Self {
        self.enforce_min_speed = enforce;
        self
    }

    /// Finish building the request.
    pub fn build(self) -> Request {
        Request {
            id: self.id,
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
            timeout_ms: self.timeout_ms,
            follow_redirects: self.follow_redirects,
            enforce_min_speed: self.enforce_min_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_header_order_and_duplicates() {
        let request = Request::builder(7, "POST", "https://example.com/api")
            .header("Accept: text/plain")
            .header("X-Tag: a")
            .header("X-Tag: b")
            .body(&b"payload"[..])
            .timeout_ms(2_500)
            .build();

        assert_eq!(request.id(), 7);
        assert_eq!(request.method(), "POST");
        assert_eq!(
            request.headers(),
            ["Accept: text/plain", "X-Tag: a", "X-Tag: b"]
        );
        assert_eq!(request.body().as_ref(), b"payload");
    }

    #[test]
    fn into_spec_carries_policy_flags() {
        let request = Request::builder(1, "GET", "https://example.com/")
            .follow_redirects(true)
            .enforce_min_speed(true)
            .build();
        let (id, spec) = request.into_spec();
        assert_eq!(id, 1);
        assert!(spec.follow_redirects);
        assert!(spec.enforce_min_speed);
        assert_eq!(spec.timeout_ms, 0);
    }
}
