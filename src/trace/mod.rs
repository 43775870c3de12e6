//! Span recording subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound carrier → Tracer::create_entry_span → Span (entry)
//! Outbound call   → Tracer::create_exit_span  → Span (exit) → inject
//!
//! Span::end / drop → FinishedSpan → SpanReporter
//! ```
//!
//! # Design Decisions
//! - A span owns its data; reporting consumes it exactly once
//! - Delivery is behind `SpanReporter`; no exporter ships with the crate

pub mod reporter;
pub mod span;
pub mod tracer;

pub use reporter::{LogReporter, MemoryReporter, NoopReporter, SpanReporter};
pub use span::{
    FinishedSpan, Span, SpanKind, SpanLayer, SpanLog, COMPONENT_HTTP_SERVER, COMPONENT_RPC_CLIENT,
    COMPONENT_RPC_SERVER, REQUEST_TAG, RESPONSE_TAG, TAG_HTTP_METHOD, TAG_STATUS_CODE, TAG_URL,
};
pub use tracer::Tracer;
