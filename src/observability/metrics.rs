//! Metrics collection.
//!
//! # Responsibilities
//! - Count access records by transport and status
//! - Track handler latency
//! - Count panicking handlers
//!
//! # Metrics
//! - `access_records_total` (counter): records by transport, status
//! - `request_duration_ms` (histogram): handler latency by transport
//! - `handler_panics_total` (counter): panics caught by the interceptors
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the library installs no exporter
//! - Labels are low-cardinality: no paths, no client addresses

use crate::record::Transport;

pub fn record_access(transport: Transport, status: String, duration_ms: u64) {
    metrics::counter!(
        "access_records_total",
        "transport" => transport.as_str(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("request_duration_ms", "transport" => transport.as_str())
        .record(duration_ms as f64);
}

pub fn record_panic(transport: Transport) {
    metrics::counter!("handler_panics_total", "transport" => transport.as_str()).increment(1);
}
