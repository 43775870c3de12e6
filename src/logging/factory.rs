//! Logger construction.
//!
//! # Responsibilities
//! - Validate the logger configuration before anything is opened
//! - Pick the encoder of every level from overrides and the log type
//! - Open sinks (stdout, stderr, rotating files, memory) and bind them to
//!   level pipelines
//!
//! # Routing
//! ```text
//! non-leveled:  [level >= min_level] → encoder(log type | info override) → stdout + <type>.log + memory
//!
//! leveled:      [level == error] → error encoder → stderr + <type>.error.log + memory
//!               [level == info]  → info encoder  → stdout + <type>.info.log  + memory
//!               [level == debug] → debug encoder → stdout + <type>.debug.log + memory
//!               (+ one pipeline per other overridden level; warn without
//!               one rides the info pipeline)
//! ```
//!
//! # Design Decisions
//! - Every pipeline is a `fmt` layer with a per-layer filter on one
//!   `Registry`; a record is encoded and written only by pipelines whose
//!   filter matches its level
//! - Everything fallible happens here; a built `Logger` cannot fail to emit

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::Dispatch;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::config::{validate_logger, EncoderConfig, LoggerConfig, ValidationError};
use crate::logging::encoder::RecordFormatter;
use crate::logging::logger::RECORD_TARGET;
use crate::logging::sink::combine;
use crate::logging::{LogLevel, LogType, Logger, MemorySink, RollingFile};
use crate::propagation::SpanContext;
use crate::record::ExtraFields;

type Pipeline = Box<dyn Layer<Registry> + Send + Sync>;

/// Errors raised while building a [`Logger`].
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("invalid logger configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Invalid(Vec<ValidationError>),

    #[error("cannot open log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("logger has no sink: enable stdout or file output, or attach a memory sink")]
    NoSink,
}

/// Builds a [`Logger`] from a [`LoggerConfig`].
pub struct LoggerBuilder {
    config: LoggerConfig,
    memory: Vec<MemorySink>,
    level_memory: Vec<(LogLevel, MemorySink)>,
    extra_fields: ExtraFields,
}

impl LoggerBuilder {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            memory: Vec::new(),
            level_memory: Vec::new(),
            extra_fields: ExtraFields::default(),
        }
    }

    /// Capture every record the logger writes.
    pub fn memory_sink(mut self, sink: MemorySink) -> Self {
        self.memory.push(sink);
        self
    }

    /// Capture only records of `level`.
    pub fn level_memory_sink(mut self, level: LogLevel, sink: MemorySink) -> Self {
        self.level_memory.push((level, sink));
        self
    }

    /// Register an extra field of union records.
    pub fn extra_field<F>(mut self, name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(Option<&SpanContext>) -> String + Send + Sync + 'static,
    {
        self.extra_fields.insert(name, accessor);
        self
    }

    pub fn build(self) -> Result<Logger, LoggerError> {
        let errors = validate_logger(&self.config);
        if !errors.is_empty() {
            return Err(LoggerError::Invalid(errors));
        }
        if !self.config.enable_stdout
            && !self.config.enable_file
            && self.memory.is_empty()
            && self.level_memory.is_empty()
        {
            return Err(LoggerError::NoSink);
        }

        let service: Arc<str> = Arc::from(self.config.service_name.as_str());
        let pipelines = if self.config.leveled_routing {
            self.leveled_pipelines(&service)?
        } else {
            self.single_pipeline(&service)?
        };

        tracing::debug!(
            service = %service,
            log_type = %self.config.log_type,
            leveled = self.config.leveled_routing,
            structured = self.config.structured,
            pipelines = pipelines.len(),
            "Logger built"
        );

        Ok(Logger {
            dispatch: Dispatch::new(Registry::default().with(pipelines)),
            service_name: service,
            log_type: self.config.log_type,
            structured: self.config.structured,
            extra_fields: self.extra_fields,
        })
    }

    /// One pipeline for every level at or above `min_level`.
    fn single_pipeline(&self, service: &Arc<str>) -> Result<Vec<Pipeline>, LoggerError> {
        let config = &self.config;
        let encoder = config
            .level_encoders
            .get(&LogLevel::Info)
            .cloned()
            .unwrap_or_else(|| type_encoder(config.log_type));
        let min_level = config.min_level;

        let mut writers = Vec::new();
        if config.enable_stdout {
            writers.push(BoxMakeWriter::new(io::stdout));
        }
        if config.enable_file {
            writers.push(self.file_writer(format!("{}.log", config.log_type))?);
        }
        writers.extend(self.memory.iter().cloned().map(BoxMakeWriter::new));

        let mut pipelines = Vec::new();
        if let Some(writer) = combine(writers) {
            pipelines.push(self.pipeline(encoder.clone(), service, writer, move |level| {
                level >= min_level
            }));
        }
        for (only, sink) in &self.level_memory {
            let only = *only;
            pipelines.push(self.pipeline(
                encoder.clone(),
                service,
                BoxMakeWriter::new(sink.clone()),
                move |level| level == only && level >= min_level,
            ));
        }
        Ok(pipelines)
    }

    /// One pipeline per routed level. A level without its own pipeline is
    /// carried by the nearest routed level below it.
    fn leveled_pipelines(&self, service: &Arc<str>) -> Result<Vec<Pipeline>, LoggerError> {
        let config = &self.config;
        let mut levels: BTreeSet<LogLevel> =
            [LogLevel::Error, LogLevel::Info, LogLevel::Debug].into();
        levels.extend(config.level_encoders.keys().copied());
        levels.extend(self.level_memory.iter().map(|(level, _)| *level));

        let mut pipelines = Vec::new();
        for &level in &levels {
            let accepted: Vec<LogLevel> = LogLevel::ALL
                .into_iter()
                .filter(|l| {
                    *l == level
                        || (!levels.contains(l) && levels.range(..*l).next_back() == Some(&level))
                })
                .collect();

            let encoder = self.level_encoder(level);

            let mut writers = Vec::new();
            if config.enable_stdout {
                if level == LogLevel::Error {
                    writers.push(BoxMakeWriter::new(io::stderr));
                } else {
                    writers.push(BoxMakeWriter::new(io::stdout));
                }
            }
            if config.enable_file {
                writers.push(
                    self.file_writer(format!("{}.{}.log", config.log_type, level.as_str()))?,
                );
            }
            writers.extend(self.memory.iter().cloned().map(BoxMakeWriter::new));
            writers.extend(
                self.level_memory
                    .iter()
                    .filter(|(only, _)| *only == level)
                    .map(|(_, sink)| BoxMakeWriter::new(sink.clone())),
            );

            if let Some(writer) = combine(writers) {
                pipelines.push(self.pipeline(encoder, service, writer, move |l| {
                    accepted.contains(&l)
                }));
            }
        }
        Ok(pipelines)
    }

    /// Override for `level`, else the preset matching the level and type.
    fn level_encoder(&self, level: LogLevel) -> EncoderConfig {
        if let Some(encoder) = self.config.level_encoders.get(&level) {
            return encoder.clone();
        }
        if level == LogLevel::Error {
            return EncoderConfig::error_layout();
        }
        type_encoder(self.config.log_type)
    }

    fn file_writer(&self, base: String) -> Result<BoxMakeWriter, LoggerError> {
        // Validation guarantees a directory when files are enabled.
        let dir = self.config.log_dir.clone().unwrap_or_default();
        let file = RollingFile::open(&dir, &base, self.config.retention_days).map_err(|source| {
            LoggerError::Io {
                path: dir.join(&base),
                source,
            }
        })?;
        Ok(BoxMakeWriter::new(file))
    }

    fn pipeline<F>(
        &self,
        encoder: EncoderConfig,
        service: &Arc<str>,
        writer: BoxMakeWriter,
        accept: F,
    ) -> Pipeline
    where
        F: Fn(LogLevel) -> bool + Send + Sync + 'static,
    {
        fmt::layer()
            .with_ansi(false)
            .event_format(RecordFormatter::new(
                encoder,
                service.clone(),
                self.config.structured,
            ))
            .with_writer(writer)
            .with_filter(filter_fn(move |meta| {
                meta.target() == RECORD_TARGET && accept(LogLevel::from_tracing(meta.level()))
            }))
            .boxed()
    }
}

/// Preset for a log type.
fn type_encoder(log_type: LogType) -> EncoderConfig {
    match log_type {
        LogType::Error => EncoderConfig::error_layout(),
        LogType::Track => EncoderConfig::track_layout(),
        _ => EncoderConfig::default_layout(),
    }
}
