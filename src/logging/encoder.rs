//! Record rendering.
//!
//! # Responsibilities
//! - Turn one record event into one fully formatted line
//! - Apply the per-level [`EncoderConfig`] layout (text or JSON)
//! - Attach a stacktrace to error-level records when one was captured
//!
//! # Design Decisions
//! - Implemented as a `tracing-subscriber` [`FormatEvent`] so the fmt layer
//!   performs a single `write_all` per record
//! - The formatter never fails a record: unrenderable parts degrade to empty

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::{self, Write as _};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::config::EncoderConfig;
use crate::logging::LogLevel;

/// Field holding the JSON form of a record, empty for plain messages.
pub(crate) const RECORD_FIELD: &str = "record";
/// Field holding the `file:line` of the emitting call site.
pub(crate) const CALLER_FIELD: &str = "caller";

/// Formats record events for one pipeline.
pub struct RecordFormatter {
    encoder: EncoderConfig,
    service: Arc<str>,
    structured: bool,
}

impl RecordFormatter {
    pub fn new(encoder: EncoderConfig, service: Arc<str>, structured: bool) -> Self {
        Self {
            encoder,
            service,
            structured,
        }
    }

    fn stacktrace(&self, level: LogLevel) -> Option<String> {
        self.encoder.stacktrace_key.as_ref()?;
        if level != LogLevel::Error {
            return None;
        }
        let backtrace = Backtrace::capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return None;
        }
        Some(backtrace.to_string())
    }

    fn timestamp(&self) -> String {
        let mut out = String::new();
        // An invalid layout is rejected at build; a formatting error leaves it empty.
        if write!(out, "{}", chrono::Local::now().format(&self.encoder.time_format)).is_err() {
            out.clear();
        }
        out
    }

    /// Text layout: present parts joined by the separator.
    fn render_text(&self, level: LogLevel, fields: &RecordFields) -> String {
        let enc = &self.encoder;
        let mut parts: Vec<String> = Vec::with_capacity(6);

        if enc.service_key.is_some() {
            parts.push(self.service.to_string());
        }
        if enc.level_key.is_some() {
            parts.push(level.capital().to_string());
        }
        if enc.time_key.is_some() {
            parts.push(self.timestamp());
        }
        if enc.caller_key.is_some() {
            parts.push(fields.caller.clone());
        }
        parts.push(fields.message.clone());
        if let Some(trace) = self.stacktrace(level) {
            parts.push(trace.escape_debug().to_string());
        }

        let mut line = parts.join(&enc.separator);
        line.push_str(&enc.line_ending);
        line
    }

    /// JSON layout: one object per record.
    fn render_json(&self, level: LogLevel, fields: &RecordFields) -> String {
        let enc = &self.encoder;
        let mut object = Map::new();

        if let Some(key) = &enc.service_key {
            object.insert(key.clone(), Value::String(self.service.to_string()));
        }
        if let Some(key) = &enc.level_key {
            object.insert(key.clone(), Value::String(level.capital().to_string()));
        }
        if let Some(key) = &enc.time_key {
            object.insert(key.clone(), Value::String(self.timestamp()));
        }
        if let Some(key) = &enc.caller_key {
            object.insert(key.clone(), Value::String(fields.caller.clone()));
        }

        if let Ok(Value::Object(record)) = serde_json::from_str::<Value>(&fields.record) {
            object.extend(record);
        }
        if !fields.message.is_empty() || fields.record.is_empty() {
            object.insert(
                enc.message_key.clone(),
                Value::String(fields.message.clone()),
            );
        }

        if let (Some(key), Some(trace)) = (&enc.stacktrace_key, self.stacktrace(level)) {
            object.insert(key.clone(), Value::String(trace));
        }

        let mut line = Value::Object(object).to_string();
        line.push_str(&enc.line_ending);
        line
    }
}

impl<S, N> FormatEvent<S, N> for RecordFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = RecordFields::default();
        event.record(&mut fields);

        let level = LogLevel::from_tracing(event.metadata().level());
        let line = if self.structured {
            self.render_json(level, &fields)
        } else {
            self.render_text(level, &fields)
        };
        writer.write_str(&line)
    }
}

/// Fields of a record event.
#[derive(Debug, Default)]
struct RecordFields {
    message: String,
    record: String,
    caller: String,
}

impl Visit for RecordFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            RECORD_FIELD => self.record = value.to_string(),
            CALLER_FIELD => self.caller = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            RECORD_FIELD => self.record = format!("{value:?}"),
            CALLER_FIELD => self.caller = format!("{value:?}"),
            _ => {}
        }
    }
}
