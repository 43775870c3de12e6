//! Spans: one timed unit of work within a trace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::propagation::SpanContext;
use crate::trace::SpanReporter;

/// Component id of the HTTP server middleware.
pub const COMPONENT_HTTP_SERVER: i32 = 5004;
/// Component id of the RPC server interceptor.
pub const COMPONENT_RPC_SERVER: i32 = 23;
/// Component id of the RPC client interceptor.
pub const COMPONENT_RPC_CLIENT: i32 = 5013;

/// Log key for captured request payloads.
pub const REQUEST_TAG: &str = "request.params";
/// Log key for captured response payloads.
pub const RESPONSE_TAG: &str = "response.result";

pub const TAG_HTTP_METHOD: &str = "http.method";
pub const TAG_URL: &str = "url";
pub const TAG_STATUS_CODE: &str = "status_code";

/// Which side of a call the span records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Entry,
    Exit,
    Local,
}

/// Protocol layer the span belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanLayer {
    #[default]
    Unknown,
    Http,
    RpcFramework,
}

/// Timestamped event recorded on a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanLog {
    pub at: DateTime<Utc>,
    pub key: String,
    pub value: String,
}

/// A span that has ended and been handed to the reporter.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedSpan {
    pub operation: String,
    pub kind: SpanKind,
    pub layer: SpanLayer,
    pub component: Option<i32>,
    pub peer: Option<String>,
    pub context: SpanContext,
    /// Operation of the caller, for entry spans continuing a remote trace.
    pub parent_endpoint: Option<String>,
    pub tags: Vec<(String, String)>,
    pub logs: Vec<SpanLog>,
    pub is_error: bool,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// An in-flight span.
///
/// Reported exactly once: by [`Span::end`], or on drop if `end` was never
/// called.
pub struct Span {
    data: FinishedSpan,
    started: Instant,
    reporter: Arc<dyn SpanReporter>,
    reported: bool,
}

impl Span {
    pub(crate) fn start(
        operation: impl Into<String>,
        kind: SpanKind,
        context: SpanContext,
        reporter: Arc<dyn SpanReporter>,
    ) -> Self {
        Self {
            data: FinishedSpan {
                operation: operation.into(),
                kind,
                layer: SpanLayer::Unknown,
                component: None,
                peer: None,
                context,
                parent_endpoint: None,
                tags: Vec::new(),
                logs: Vec::new(),
                is_error: false,
                started_at: Utc::now(),
                duration: Duration::ZERO,
            },
            started: Instant::now(),
            reporter,
            reported: false,
        }
    }

    pub fn context(&self) -> &SpanContext {
        &self.data.context
    }

    pub fn operation(&self) -> &str {
        &self.data.operation
    }

    pub fn kind(&self) -> SpanKind {
        self.data.kind
    }

    pub fn set_component(&mut self, component: i32) {
        self.data.component = Some(component);
    }

    pub fn set_layer(&mut self, layer: SpanLayer) {
        self.data.layer = layer;
    }

    pub fn set_peer(&mut self, peer: impl Into<String>) {
        self.data.peer = Some(peer.into());
    }

    pub(crate) fn set_parent_endpoint(&mut self, endpoint: impl Into<String>) {
        self.data.parent_endpoint = Some(endpoint.into());
    }

    pub fn tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.tags.push((key.into(), value.into()));
    }

    pub fn log(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.logs.push(SpanLog {
            at: Utc::now(),
            key: key.into(),
            value: value.into(),
        });
    }

    /// Mark the span failed and record `value` under `key`.
    pub fn error(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.is_error = true;
        self.log(key, value);
    }

    pub fn is_error(&self) -> bool {
        self.data.is_error
    }

    /// End the span and report it.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.reported {
            return;
        }
        self.reported = true;
        self.data.duration = self.started.elapsed();
        self.reporter.report(self.data.clone());
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span").field("data", &self.data).finish()
    }
}
