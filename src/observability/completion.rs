//! Terminal step shared by the server interceptors.
//!
//! # Responsibilities
//! - Hold the in-flight record, entry span and start time of one request
//! - Finish exactly once: end the span, record metrics, emit the record
//! - Finish with a cancellation outcome when the request future is dropped
//!
//! # State Machine
//! ```text
//! start ──finish()──▶ Logged
//!   │
//!   └──drop──▶ Logged (cancel outcome)
//! ```

use std::sync::Arc;
use std::time::Instant;

use crate::logging::{LogLevel, LogType, Logger};
use crate::observability::metrics;
use crate::propagation::SpanContext;
use crate::record::{AccessLog, TraceFields, UnionLog};
use crate::rpc::Code;
use crate::trace::{Span, TAG_STATUS_CODE};

/// Final status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Http(u16),
    Grpc(Code),
}

impl Outcome {
    fn label(&self) -> String {
        match self {
            Outcome::Http(status) => status.to_string(),
            Outcome::Grpc(code) => code.as_str().to_string(),
        }
    }
}

/// Drop guard producing the single record of one request.
pub struct Completion {
    logger: Arc<Logger>,
    record: AccessLog,
    span: Option<Span>,
    context: Option<SpanContext>,
    started: Instant,
    emit_record: bool,
    on_cancel: Outcome,
    finished: bool,
}

impl Completion {
    /// Start tracking a request.
    ///
    /// `emit_record` is false for local health checks: the span still ends but
    /// no record is written.
    pub fn start(
        logger: Arc<Logger>,
        record: AccessLog,
        span: Option<Span>,
        emit_record: bool,
        on_cancel: Outcome,
    ) -> Self {
        let context = span.as_ref().map(|s| s.context().clone());
        Self {
            logger,
            record,
            span,
            context,
            started: Instant::now(),
            emit_record,
            on_cancel,
            finished: false,
        }
    }

    /// Context of the entry span, if the request is spanned.
    pub fn context(&self) -> Option<&SpanContext> {
        self.context.as_ref()
    }

    pub fn span_mut(&mut self) -> Option<&mut Span> {
        self.span.as_mut()
    }

    pub fn record_mut(&mut self) -> &mut AccessLog {
        &mut self.record
    }

    /// End the span and emit the record at `level`.
    pub fn finish(mut self, outcome: Outcome, response: Vec<u8>, level: LogLevel) {
        self.complete(outcome, response, level);
    }

    fn complete(&mut self, outcome: Outcome, response: Vec<u8>, level: LogLevel) {
        if self.finished {
            return;
        }
        self.finished = true;

        self.record.duration_ms = self.started.elapsed().as_millis() as u64;
        self.record.response = response;
        match outcome {
            Outcome::Http(status) => self.record.status_code = Some(status),
            Outcome::Grpc(code) => self.record.grpc_status = code.as_str().to_string(),
        }

        if let Some(mut span) = self.span.take() {
            if let Outcome::Http(status) = outcome {
                span.tag(TAG_STATUS_CODE, status.to_string());
            }
            span.end();
        }

        metrics::record_access(self.record.transport, outcome.label(), self.record.duration_ms);

        if !self.emit_record {
            return;
        }
        let ctx = self.context.as_ref();
        if self.logger.log_type() == LogType::Union {
            UnionLog::new(self.record.clone()).log_at(&self.logger, level, ctx);
        } else {
            self.record.log_at(&self.logger, level, TraceFields::Include(ctx));
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::debug!(
            request = %self.record.request,
            "Request dropped before completion"
        );
        if let Some(span) = self.span.as_mut() {
            span.error("event", "canceled");
        }
        self.complete(self.on_cancel, Vec::new(), LogLevel::Info);
    }
}
