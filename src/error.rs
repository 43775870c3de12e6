//! Coded application errors stamped with the active trace.

use std::error::Error as StdError;
use std::fmt::Display;

use crate::propagation::{span_id_of, trace_id_of, SpanContext};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error carrying a code, a message and the ids of the trace it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct TracedError {
    pub code: String,
    pub message: String,
    /// Empty when raised outside a trace.
    pub trace_id: String,
    pub span_id: String,
    #[source]
    pub source: Option<BoxError>,
}

impl TracedError {
    pub fn new(ctx: Option<&SpanContext>, code: impl Display, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            trace_id: trace_id_of(ctx),
            span_id: span_id_of(ctx),
            source: None,
        }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
