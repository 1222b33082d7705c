//! Dispatcher metrics.
//!
//! Counters for the request lifecycle, exposed through metriken so the
//! embedding application can scrape them alongside its own.

use metriken::{Counter, metric};

#[metric(
    name = "httpline/requests/submitted",
    description = "Requests accepted by send()"
)]
pub static REQUESTS_SUBMITTED: Counter = Counter::new();

#[metric(
    name = "httpline/requests/completed",
    description = "Completion handlers invoked"
)]
pub static REQUESTS_COMPLETED: Counter = Counter::new();

#[metric(
    name = "httpline/requests/dropped",
    description = "Requests dropped before a transfer started (engine setup failure or shutdown)"
)]
pub static REQUESTS_DROPPED: Counter = Counter::new();

#[metric(
    name = "httpline/transfers/failed",
    description = "Transfers that completed with a non-success engine outcome"
)]
pub static TRANSFERS_FAILED: Counter = Counter::new();

#[metric(
    name = "httpline/bytes/received",
    description = "Response body bytes received"
)]
pub static RESPONSE_BYTES: Counter = Counter::new();
