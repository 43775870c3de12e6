//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ObservabilityConfig (validated, immutable)
//!     → LoggerBuilder / AccessLogLayer / interceptors
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a logger is built once per process
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    EncoderConfig, HttpTraceConfig, ListenerConfig, LoggerConfig, ObservabilityConfig,
    ReporterKind, RpcTraceConfig, TracerConfig,
};
pub use validation::{validate_config, validate_logger, ValidationError};
