//! Request records: one per outbound call.

use serde_json::{Map, Value};

use crate::logging::{LogLevel, LogType, Logger};
use crate::propagation::SpanContext;
use crate::record::format::{or_empty, payload_value, quote_payload, TraceFields, LOG_TYPE_FIELD};

/// Summary of one outbound call.
///
/// Text layout:
///
/// ```text
/// method duration request $"payload"$ description $"response"$ service [trace span]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLog {
    pub method: String,
    pub request: String,
    /// Outcome of the call, such as `OK` or an error message.
    pub status_description: String,
    pub duration_ms: u64,
    pub payload: Vec<u8>,
    pub response: Vec<u8>,
}

impl RequestLog {
    pub fn line(&self, service: &str, trace: TraceFields<'_>) -> String {
        let mut line = format!(
            "{} {} {} ${}$ {} ${}$ {}",
            or_empty(&self.method),
            self.duration_ms,
            or_empty(&self.request),
            quote_payload(&self.payload),
            or_empty(&self.status_description),
            quote_payload(&self.response),
            or_empty(service),
        );
        trace.push_text(&mut line);
        line
    }

    pub fn fields(&self, service: &str, trace: TraceFields<'_>) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("method".into(), self.method.clone().into());
        fields.insert("duration".into(), self.duration_ms.into());
        fields.insert("request".into(), self.request.clone().into());
        fields.insert("payload".into(), payload_value(&self.payload));
        fields.insert(
            "status_description".into(),
            self.status_description.clone().into(),
        );
        fields.insert("response".into(), payload_value(&self.response));
        fields.insert("service".into(), service.into());
        fields.insert(LOG_TYPE_FIELD.into(), LogType::Request.as_str().into());
        trace.insert_fields(&mut fields);
        fields
    }

    #[track_caller]
    pub fn log(&self, logger: &Logger) {
        self.log_at(logger, LogLevel::Info, TraceFields::Omit);
    }

    #[track_caller]
    pub fn log_with_context(&self, logger: &Logger, ctx: Option<&SpanContext>) {
        self.log_at(logger, LogLevel::Info, TraceFields::Include(ctx));
    }

    #[track_caller]
    pub fn log_at(&self, logger: &Logger, level: LogLevel, trace: TraceFields<'_>) {
        logger.emit(
            level,
            || self.line(logger.service_name(), trace),
            || self.fields(logger.service_name(), trace),
        );
    }
}
