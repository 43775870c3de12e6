//! HTTP server instrumentation.
//!
//! # Data Flow
//! ```text
//! Request
//!     → access_log.rs (filter → client ip → sw8 entry span → buffer body)
//!     → inner service (handler sees SpanContext in extensions)
//!     → access_log.rs (buffer response → end span → access record)
//!     → Response (unchanged)
//! ```

pub mod access_log;

pub use access_log::{AccessLogLayer, AccessLogService, OperationFn, STATUS_CLIENT_CLOSED};
