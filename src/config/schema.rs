//! Configuration schema definitions.
//!
//! Every type derives Serde traits for deserialization from TOML and every
//! field has a default, so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logging::{LogLevel, LogType};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Listener of the demo server.
    pub listener: ListenerConfig,

    /// Record logger.
    pub logger: LoggerConfig,

    /// HTTP access-log middleware.
    pub http: HttpTraceConfig,

    /// RPC interceptors.
    pub rpc: RpcTraceConfig,

    /// Span reporting.
    pub tracer: TracerConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Logger construction options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Service name printed in records.
    pub service_name: String,

    /// Logical record type; names the output files.
    pub log_type: LogType,

    /// Directory of the rotating files. Required when `enable_file` is set.
    pub log_dir: Option<PathBuf>,

    pub enable_stdout: bool,

    pub enable_file: bool,

    /// One pipeline per level, each with its own encoder and sinks.
    pub leveled_routing: bool,

    /// JSON objects instead of text lines.
    pub structured: bool,

    /// Lowest level written when routing is not leveled.
    pub min_level: LogLevel,

    /// Days a rotated file is kept.
    pub retention_days: u32,

    /// Encoder overrides keyed by level.
    pub level_encoders: BTreeMap<LogLevel, EncoderConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_type: LogType::Access,
            log_dir: None,
            enable_stdout: true,
            enable_file: false,
            leveled_routing: false,
            structured: false,
            min_level: LogLevel::Info,
            retention_days: 30,
            level_encoders: BTreeMap::new(),
        }
    }
}

fn default_service_name() -> String {
    std::env::var("SERVICE_NAME")
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

/// Layout of one rendered record.
///
/// Keys set to `None` are omitted. In text mode the present parts are
/// joined by `separator` in the order service, level, time, caller,
/// message, stacktrace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub time_key: Option<String>,
    pub level_key: Option<String>,
    pub service_key: Option<String>,
    pub caller_key: Option<String>,
    pub stacktrace_key: Option<String>,
    pub message_key: String,
    pub separator: String,
    pub line_ending: String,
    /// chrono `strftime` layout.
    pub time_format: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::default_layout()
    }
}

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl EncoderConfig {
    /// `time msg`
    pub fn default_layout() -> Self {
        Self {
            time_key: Some("time".to_string()),
            level_key: None,
            service_key: None,
            caller_key: None,
            stacktrace_key: None,
            message_key: "msg".to_string(),
            separator: " ".to_string(),
            line_ending: "\n".to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// `service LEVEL time msg`
    pub fn track_layout() -> Self {
        Self {
            service_key: Some("service".to_string()),
            level_key: Some("level".to_string()),
            ..Self::default_layout()
        }
    }

    /// `service LEVEL time caller msg [stacktrace]`
    pub fn error_layout() -> Self {
        Self {
            caller_key: Some("caller".to_string()),
            stacktrace_key: Some("stacktrace".to_string()),
            ..Self::track_layout()
        }
    }
}

/// HTTP access-log middleware options.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HttpTraceConfig {
    /// Exact paths that bypass tracing and logging.
    pub filter_paths: Vec<String>,

    /// Tags added to every entry span.
    pub extra_tags: BTreeMap<String, String>,
}

/// RPC interceptor options.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RpcTraceConfig {
    /// Full method names that bypass tracing and logging.
    pub filter_methods: Vec<String>,

    /// Metadata keys copied onto the entry span as tags.
    pub report_tags: Vec<String>,
}

/// Where finished spans go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReporterKind {
    /// The process's own diagnostics at debug level.
    #[default]
    Log,
    /// Discarded.
    Noop,
}

/// Span reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracerConfig {
    /// Create spans at all.
    pub enabled: bool,

    pub reporter: ReporterKind,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reporter: ReporterKind::Log,
        }
    }
}
