//! Record logger subsystem.
//!
//! # Data Flow
//! ```text
//! LoggerConfig
//!     → factory.rs (validate, pick encoders, open sinks)
//!     → Logger (immutable, shared via Arc)
//!
//! Record emission:
//!     record (line | fields)
//!     → logger.rs (scoped dispatch, one event per record)
//!     → level pipelines (filter → encoder.rs → sink.rs / rotation.rs)
//! ```
//!
//! # Design Decisions
//! - Built on `tracing-subscriber` layers, isolated from the global subscriber
//! - No background writer: emission blocks on the sink's own lock
//! - Service name is part of the logger, not process-global state

pub mod encoder;
pub mod factory;
pub mod level;
pub mod logger;
pub mod rotation;
pub mod sink;

pub use encoder::RecordFormatter;
pub use factory::{LoggerBuilder, LoggerError};
pub use level::{LogLevel, LogType};
pub use logger::Logger;
pub use rotation::RollingFile;
pub use sink::MemorySink;
