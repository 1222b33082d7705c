//! httpline: asynchronous HTTPS request/response dispatcher.
//!
//! A thin dispatcher over libcurl's multi interface: enqueue many
//! concurrent HTTP(S) requests from any number of producer threads and
//! receive completion callbacks with the parsed status line, header
//! list, and body. One background thread per client drives all
//! transfers; `send` never blocks on network I/O and no thread is
//! spawned per request.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use httpline::{ClientConfig, ClientHandle, HttpsClient, Request, Response, TransferOutcome};
//!
//! let client = HttpsClient::new(ClientConfig::default());
//! client.start();
//!
//! let request = Request::builder(1, "GET", "https://example.com/")
//!     .header("Accept: application/json")
//!     .timeout_ms(5_000)
//!     .follow_redirects(true)
//!     .build();
//!
//! client
//!     .send(
//!         request,
//!         |_client: &ClientHandle, id: u64, response: Response, outcome: TransferOutcome| {
//!             println!("request {id}: {} ({outcome:?})", response.status_line());
//!         },
//!     )
//!     .unwrap();
//!
//! // ... completions arrive on the worker thread ...
//! client.stop();
//! ```
//!
//! # Architecture
//!
//! `HttpsClient` hands submissions to a single poll worker over a
//! channel. The worker starts each transfer on the engine, tracks it in
//! a handle-keyed registry, drives the engine until idle, then drains
//! completion events and invokes handlers synchronously, exactly once
//! per handle, in engine delivery order. Stopping the client joins the
//! worker and drops whatever is still in flight.
//!
//! The engine itself sits behind the [`TransferEngine`] trait;
//! [`mock::MockEngine`] scripts it for tests.

pub(crate) mod context;
pub(crate) mod global;
pub(crate) mod metrics;
pub(crate) mod registry;
pub(crate) mod worker;

pub mod client;
pub mod config;
pub mod curl_multi;
pub mod engine;
pub mod error;
pub mod mock;
pub mod parser;
pub mod request;
pub mod response;

pub use client::{ClientHandle, CompletionHandler, HttpsClient};
pub use config::ClientConfig;
pub use curl_multi::CurlMultiEngine;
pub use engine::{ByteSink, ByteSinks, HandleId, TransferEngine, TransferOutcome, TransferSpec};
pub use error::{EngineError, Error};
pub use parser::HeaderStreamParser;
pub use request::{Request, RequestBuilder};
pub use response::Response;
