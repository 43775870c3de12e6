//! Log record types.
//!
//! # Responsibilities
//! - Define the access, request and union records and their layouts
//! - Render each record as a text line or a structured field map
//! - Emit plain error and track messages
//!
//! # Design Decisions
//! - Records are plain values built right before emission
//! - Formatting is total: empty values render as `-`, payloads are quoted
//!   and escaped, never HTML-escaped
//! - Service name and encoder come from the `Logger`, never from globals

pub mod access;
pub mod format;
pub mod payload;
pub mod request;
pub mod union;

use std::error::Error;
use std::fmt::Display;

pub use access::{AccessLog, Transport};
pub use format::{or_empty, quote_payload, TraceFields, EMPTY, LOG_TYPE_FIELD};
pub use payload::{marshal_or_empty, panic_message, panic_payload, MarshalPayload, PayloadError};
pub use request::RequestLog;
pub use union::{ExtraFields, FieldAccessor, UnionLog};

use crate::logging::{LogLevel, LogType, Logger};

/// Emit `err` and its source chain at error level.
#[track_caller]
pub fn error(logger: &Logger, err: &dyn Error) {
    logger.typed_message(LogLevel::Error, LogType::Error, error_chain(err));
}

/// Emit a tracking message at info level.
#[track_caller]
pub fn track(logger: &Logger, message: impl Display) {
    logger.typed_message(LogLevel::Info, LogType::Track, message);
}

/// `err: source: source ...`
pub fn error_chain(err: &dyn Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryError {
        #[source]
        source: std::io::Error,
    }

    #[test]
    fn error_chain_includes_sources() {
        let err = QueryError {
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"),
        };
        assert_eq!(error_chain(&err), "query failed: timed out");
    }
}
