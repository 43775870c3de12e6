//! Shared rendering helpers for record text layouts.

use serde_json::{Map, Value};

use crate::propagation::{span_id_of, trace_id_of, SpanContext};

/// Marker printed for empty values.
pub const EMPTY: &str = "-";

/// Structured key naming the record kind.
pub const LOG_TYPE_FIELD: &str = "log_type";

/// Whether a record carries the trace and span ids of a context.
#[derive(Debug, Clone, Copy)]
pub enum TraceFields<'a> {
    /// Layout without trace columns.
    Omit,
    /// Trace columns from the context, empty markers when there is none.
    Include(Option<&'a SpanContext>),
}

impl TraceFields<'_> {
    /// Append ` trace span` to a text line.
    pub(crate) fn push_text(&self, line: &mut String) {
        if let TraceFields::Include(ctx) = self {
            line.push(' ');
            line.push_str(or_empty(&trace_id_of(*ctx)));
            line.push(' ');
            line.push_str(or_empty(&span_id_of(*ctx)));
        }
    }

    pub(crate) fn insert_fields(&self, fields: &mut Map<String, Value>) {
        if let TraceFields::Include(ctx) = self {
            fields.insert("trace_id".into(), Value::String(trace_id_of(*ctx)));
            fields.insert("span_id".into(), Value::String(span_id_of(*ctx)));
        }
    }
}

/// `value`, or the empty marker.
pub fn or_empty(value: &str) -> &str {
    if value.is_empty() {
        EMPTY
    } else {
        value
    }
}

/// Quote a payload for a text line.
///
/// UTF-8 payloads are quoted with escapes for quotes, backslashes and
/// control characters; other bytes are escaped as ASCII. Nothing is
/// HTML-escaped. An empty payload renders as the bare empty marker.
pub fn quote_payload(payload: &[u8]) -> String {
    if payload.is_empty() {
        return EMPTY.to_string();
    }
    match std::str::from_utf8(payload) {
        Ok(text) => format!("{text:?}"),
        Err(_) => format!("\"{}\"", payload.escape_ascii()),
    }
}

/// Payload as a JSON string value.
pub fn payload_value(payload: &[u8]) -> Value {
    Value::String(String::from_utf8_lossy(payload).into_owned())
}
