//! The immutable record logger.

use std::fmt::{self, Display};
use std::panic::Location;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{Dispatch, Level};

use crate::config::LoggerConfig;
use crate::logging::encoder::{CALLER_FIELD, RECORD_FIELD};
use crate::logging::{LogLevel, LogType, LoggerBuilder};
use crate::record::{ExtraFields, LOG_TYPE_FIELD};

/// Target of every record event. Pipelines accept nothing else.
pub(crate) const RECORD_TARGET: &str = "access_trace::record";

macro_rules! record_event {
    ($level:expr, $message:expr, $record:expr, $caller:expr) => {
        tracing::event!(
            target: RECORD_TARGET,
            $level,
            record = $record,
            caller = $caller,
            "{}",
            $message
        )
    };
}

/// Writes records through its per-level pipelines.
///
/// Built once, then shared (`Arc<Logger>`) and used concurrently. Records
/// go through a scoped dispatcher and never reach the process-global
/// `tracing` subscriber.
#[derive(Clone)]
pub struct Logger {
    pub(crate) dispatch: Dispatch,
    pub(crate) service_name: Arc<str>,
    pub(crate) log_type: LogType,
    pub(crate) structured: bool,
    pub(crate) extra_fields: ExtraFields,
}

impl Logger {
    pub fn builder(config: LoggerConfig) -> LoggerBuilder {
        LoggerBuilder::new(config)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn log_type(&self) -> LogType {
        self.log_type
    }

    pub fn is_structured(&self) -> bool {
        self.structured
    }

    pub fn extra_fields(&self) -> &ExtraFields {
        &self.extra_fields
    }

    #[track_caller]
    pub fn debug(&self, message: impl Display) {
        self.message(LogLevel::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Display) {
        self.message(LogLevel::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Display) {
        self.message(LogLevel::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Display) {
        self.message(LogLevel::Error, message);
    }

    /// Plain message at `level`.
    #[track_caller]
    pub fn message(&self, level: LogLevel, message: impl Display) {
        self.write(level, &message.to_string(), "", Location::caller());
    }

    /// Plain message whose structured form names its record kind.
    #[track_caller]
    pub fn typed_message(&self, level: LogLevel, kind: LogType, message: impl Display) {
        let record = if self.structured {
            let mut fields = Map::new();
            fields.insert(LOG_TYPE_FIELD.into(), kind.as_str().into());
            Value::Object(fields).to_string()
        } else {
            String::new()
        };
        self.write(level, &message.to_string(), &record, Location::caller());
    }

    /// Emit a record. Only the form the pipelines encode is rendered.
    #[track_caller]
    pub fn emit<L, F>(&self, level: LogLevel, line: L, fields: F)
    where
        L: FnOnce() -> String,
        F: FnOnce() -> Map<String, Value>,
    {
        let caller = Location::caller();
        if self.structured {
            let record = Value::Object(fields()).to_string();
            self.write(level, "", &record, caller);
        } else {
            self.write(level, &line(), "", caller);
        }
    }

    fn write(&self, level: LogLevel, message: &str, record: &str, caller: &Location<'_>) {
        let caller = format!("{}:{}", caller.file(), caller.line());
        let caller = caller.as_str();
        tracing::dispatcher::with_default(&self.dispatch, || match level {
            LogLevel::Debug => record_event!(Level::DEBUG, message, record, caller),
            LogLevel::Info => record_event!(Level::INFO, message, record, caller),
            LogLevel::Warn => record_event!(Level::WARN, message, record, caller),
            LogLevel::Error => record_event!(Level::ERROR, message, record, caller),
        });
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("service_name", &self.service_name)
            .field("log_type", &self.log_type)
            .field("structured", &self.structured)
            .field("extra_fields", &self.extra_fields)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;

    fn memory_logger(config: LoggerConfig) -> (Logger, MemorySink) {
        let sink = MemorySink::new();
        let logger = Logger::builder(LoggerConfig {
            enable_stdout: false,
            ..config
        })
        .memory_sink(sink.clone())
        .build()
        .unwrap();
        (logger, sink)
    }

    #[test]
    fn messages_below_min_level_are_dropped() {
        let (logger, sink) = memory_logger(LoggerConfig::default());
        logger.debug("hidden");
        logger.info("shown");
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(" shown"));
    }

    #[test]
    fn caller_is_the_call_site() {
        let (logger, sink) = memory_logger(LoggerConfig {
            log_type: LogType::Error,
            ..LoggerConfig::default()
        });
        logger.error("boom");
        assert!(sink.contents().contains("logger.rs:"));
    }

    #[test]
    fn structured_records_are_json() {
        let (logger, sink) = memory_logger(LoggerConfig {
            structured: true,
            service_name: "orders".into(),
            log_type: LogType::Track,
            ..LoggerConfig::default()
        });
        logger.emit(LogLevel::Info, || unreachable!(), || {
            let mut fields = Map::new();
            fields.insert("method".into(), "GET".into());
            fields
        });

        let value: Value = serde_json::from_str(&sink.lines()[0]).unwrap();
        assert_eq!(value["method"], "GET");
        assert_eq!(value["service"], "orders");
    }

    #[test]
    fn records_do_not_reach_global_subscriber() {
        let (logger, sink) = memory_logger(LoggerConfig::default());
        tracing::info!("process diagnostics");
        logger.info("record");
        assert_eq!(sink.lines().len(), 1);
    }
}
