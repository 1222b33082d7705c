//! Per-request mutable state.

use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

use crate::client::CompletionHandler;
use crate::parser::HeaderStreamParser;
use crate::response::Response;

/// Incoming response accumulator, shared between the registry-held
/// context and the engine's byte sinks.
pub(crate) struct ResponseAccum {
    pub(crate) parser: HeaderStreamParser,
    pub(crate) body: BytesMut,
}

impl ResponseAccum {
    pub(crate) fn new(max_header_bytes: usize) -> Self {
        ResponseAccum {
            parser: HeaderStreamParser::new(max_header_bytes),
            body: BytesMut::new(),
        }
    }

    /// Assemble the response delivered to the completion handler,
    /// leaving the accumulator empty.
    pub(crate) fn take_response(&mut self) -> Response {
        let (status_line, headers) = self.parser.take();
        Response::new(status_line, headers, self.body.split().freeze())
    }
}

/// State for one in-flight transfer: the request identity, the response
/// accumulator, and the caller's completion handler.
///
/// Exactly one context exists per in-flight transfer. It is created at
/// submission and dropped right after the completion handler returns
/// (or at shutdown teardown, in which case the handler is never
/// invoked).
pub(crate) struct RequestContext {
    pub(crate) request_id: u64,
    pub(crate) accum: Arc<Mutex<ResponseAccum>>,
    pub(crate) handler: Box<dyn CompletionHandler>,
}

impl RequestContext {
    pub(crate) fn new(
        request_id: u64,
        max_header_bytes: usize,
        handler: Box<dyn CompletionHandler>,
    ) -> Self {
        RequestContext {
            request_id,
            accum: Arc::new(Mutex::new(ResponseAccum::new(max_header_bytes))),
            handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_response_drains_accumulator() {
        let mut accum = ResponseAccum::new(64 * 1024);
        accum.parser.append(b"HTTP/1.1 200 OK\r\nA: 1\r\n\r\n");
        accum.body.extend_from_slice(b"hello");

        let response = accum.take_response();
        assert_eq!(response.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(response.headers(), ["A: 1"]);
        assert_eq!(response.body().as_ref(), b"hello");

        let empty = accum.take_response();
        assert_eq!(empty.status_line(), "");
        assert!(empty.body().is_empty());
    }
}
