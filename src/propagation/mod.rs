//! Trace context propagation subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound carrier (HTTP headers / RPC metadata)
//!     → carrier.rs (Extractor)
//!     → codec.rs (decode sw8 + sw8-correlation)
//!     → SpanContext (context.rs)
//!
//! Outbound call:
//!     SpanContext → codec.rs (encode) → carrier.rs (Injector)
//! ```
//!
//! # Design Decisions
//! - Malformed inbound data never fails a request; extraction returns `None`
//! - Correlation entries are opaque to the propagator
//! - Header names are fixed for a closed deployment

pub mod carrier;
pub mod codec;
pub mod context;

pub use carrier::{Extractor, Injector};
pub use codec::{decode, decode_correlation, encode, encode_correlation};
pub use context::{span_id_of, trace_id_of, SegmentId, SpanContext, SpanId, TraceId};

/// Primary trace header.
pub const HEADER: &str = "sw8";

/// Correlation header.
pub const HEADER_CORRELATION: &str = "sw8-correlation";

/// Errors raised while decoding propagation headers.
#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid sample flag {0:?}")]
    InvalidSampleFlag(String),

    #[error("invalid {field}: {value:?}")]
    InvalidId { field: &'static str, value: String },

    #[error("parent segment and parent span must be both present or both absent")]
    HalfParent,

    #[error("malformed correlation entry {0:?}")]
    MalformedCorrelation(String),

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Read a [`SpanContext`] from an inbound carrier.
///
/// Returns `None` when the primary header is absent or malformed. A
/// malformed correlation header is dropped and the context kept.
pub fn extract<E: Extractor + ?Sized>(carrier: &E) -> Option<SpanContext> {
    let value = carrier.get(HEADER)?;
    let mut ctx = match decode(&value) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed trace header");
            return None;
        }
    };

    if let Some(correlation) = carrier.get(HEADER_CORRELATION) {
        match decode_correlation(&correlation) {
            Ok(entries) => ctx.correlation = entries,
            Err(e) => tracing::debug!(error = %e, "Ignoring malformed correlation header"),
        }
    }

    Some(ctx)
}

/// Write a [`SpanContext`] into an outbound carrier.
pub fn inject<I: Injector + ?Sized>(ctx: &SpanContext, carrier: &mut I) {
    carrier.set(HEADER, encode(ctx));
    if !ctx.correlation.is_empty() {
        carrier.set(HEADER_CORRELATION, encode_correlation(&ctx.correlation));
    }
}
