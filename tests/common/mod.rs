//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use access_trace::config::LoggerConfig;
use access_trace::logging::{LogType, Logger, MemorySink};
use access_trace::propagation::{self, SpanContext};
use access_trace::trace::{MemoryReporter, Tracer};
use axum::http::HeaderMap;

pub const SERVICE: &str = "svc";

/// Logger writing only to an in-memory sink.
pub fn memory_logger(log_type: LogType) -> (Arc<Logger>, MemorySink) {
    let sink = MemorySink::new();
    let logger = Logger::builder(quiet_config(log_type))
        .memory_sink(sink.clone())
        .build()
        .unwrap();
    (Arc::new(logger), sink)
}

/// Config with every real sink disabled.
pub fn quiet_config(log_type: LogType) -> LoggerConfig {
    LoggerConfig {
        service_name: SERVICE.to_string(),
        log_type,
        enable_stdout: false,
        ..LoggerConfig::default()
    }
}

/// Tracer collecting finished spans in memory.
pub fn memory_tracer() -> (Tracer, Arc<MemoryReporter>) {
    let reporter = Arc::new(MemoryReporter::default());
    (Tracer::new(SERVICE, reporter.clone()), reporter)
}

/// Headers carrying a fresh upstream context.
pub fn traced_headers() -> (HeaderMap, SpanContext) {
    let upstream = SpanContext::new_root("/upstream");
    let mut headers = HeaderMap::new();
    propagation::inject(&upstream, &mut headers);
    (headers, upstream)
}

/// Last two space separated columns of an access line.
pub fn trace_columns(line: &str) -> (String, String) {
    let mut columns = line.trim_end().rsplitn(3, ' ');
    let span = columns.next().unwrap_or_default().to_string();
    let trace = columns.next().unwrap_or_default().to_string();
    (trace, span)
}
