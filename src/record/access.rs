//! Access records: one per served request.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::logging::{LogLevel, LogType, Logger};
use crate::propagation::SpanContext;
use crate::record::format::{or_empty, payload_value, quote_payload, TraceFields, LOG_TYPE_FIELD};

/// Transport a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Http,
    Grpc,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Grpc => "grpc",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one served request.
///
/// Text layout:
///
/// ```text
/// client method request $"payload"$ protocol status duration "agent" service $"response"$ transport grpc_status [trace span]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessLog {
    pub client_ip: String,
    pub method: String,
    /// Path, or full method name for RPC.
    pub request: String,
    pub payload: Vec<u8>,
    pub protocol: String,
    /// HTTP status; `None` for RPC.
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    pub agent: String,
    pub response: Vec<u8>,
    pub transport: Transport,
    pub grpc_status: String,
}

impl AccessLog {
    /// Text form.
    pub fn line(&self, service: &str, trace: TraceFields<'_>) -> String {
        let status = self
            .status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mut line = format!(
            "{} {} {} ${}$ {} {} {} \"{}\" {} ${}$ {} {}",
            or_empty(&self.client_ip),
            or_empty(&self.method),
            or_empty(&self.request),
            quote_payload(&self.payload),
            or_empty(&self.protocol),
            status,
            self.duration_ms,
            or_empty(&self.agent),
            or_empty(service),
            quote_payload(&self.response),
            self.transport,
            or_empty(&self.grpc_status),
        );
        trace.push_text(&mut line);
        line
    }

    /// Structured form.
    pub fn fields(&self, service: &str, trace: TraceFields<'_>) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("client_ip".into(), self.client_ip.clone().into());
        fields.insert("method".into(), self.method.clone().into());
        fields.insert("request".into(), self.request.clone().into());
        fields.insert("payload".into(), payload_value(&self.payload));
        fields.insert("protocol".into(), self.protocol.clone().into());
        fields.insert(
            "status_code".into(),
            self.status_code.map(Value::from).unwrap_or(Value::Null),
        );
        fields.insert("duration".into(), self.duration_ms.into());
        fields.insert("agent".into(), self.agent.clone().into());
        fields.insert("service".into(), service.into());
        fields.insert("response".into(), payload_value(&self.response));
        fields.insert(LOG_TYPE_FIELD.into(), LogType::Access.as_str().into());
        fields.insert("transport".into(), self.transport.as_str().into());
        fields.insert("grpc_status".into(), self.grpc_status.clone().into());
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
