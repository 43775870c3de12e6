//! Destinations for finished spans.

use parking_lot::Mutex;

use crate::trace::FinishedSpan;

/// Receives every span exactly once, when it ends.
pub trait SpanReporter: Send + Sync {
    fn report(&self, span: FinishedSpan);
}

/// Writes finished spans to the crate's own `tracing` diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl SpanReporter for LogReporter {
    fn report(&self, span: FinishedSpan) {
        tracing::debug!(
            operation = %span.operation,
            kind = ?span.kind,
            layer = ?span.layer,
            component = ?span.component,
            peer = span.peer.as_deref().unwrap_or("-"),
            trace_id = %span.context.trace_id,
            span_id = %span.context.span_id,
            is_error = span.is_error,
            duration_ms = span.duration.as_millis() as u64,
            tags = span.tags.len(),
            logs = span.logs.len(),
            "Span finished"
        );
    }
}

/// Keeps finished spans in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    spans: Mutex<Vec<FinishedSpan>>,
}

impl MemoryReporter {
    /// Snapshot of every span reported so far.
    pub fn spans(&self) -> Vec<FinishedSpan> {
        self.spans.lock().clone()
    }
}

impl SpanReporter for MemoryReporter {
    fn report(&self, span: FinishedSpan) {
        self.spans.lock().push(span);
    }
}

/// Discards spans.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl SpanReporter for NoopReporter {
    fn report(&self, _span: FinishedSpan) {}
}
