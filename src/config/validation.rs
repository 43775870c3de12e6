//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, retention > 0)
//! - Check logger options that depend on each other (file sink needs a directory)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure; checks touching the filesystem happen when the logger is built

use std::net::SocketAddr;

use crate::config::schema::{EncoderConfig, LoggerConfig, ObservabilityConfig};

/// One rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &ObservabilityConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address {:?}", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    errors.extend(validate_logger(&config.logger));

    for path in &config.http.filter_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                "http.filter_paths",
                format!("path {path:?} must start with '/'"),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Logger checks shared with [`crate::logging::LoggerBuilder`].
pub fn validate_logger(config: &LoggerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.enable_file && config.log_dir.is_none() {
        errors.push(ValidationError::new(
            "logger.log_dir",
            "required when enable_file is set",
        ));
    }
    if config.retention_days == 0 {
        errors.push(ValidationError::new(
            "logger.retention_days",
            "must be greater than zero",
        ));
    }
    if config.service_name.is_empty() {
        errors.push(ValidationError::new("logger.service_name", "must not be empty"));
    }

    for (level, encoder) in &config.level_encoders {
        errors.extend(validate_encoder(&format!("logger.level_encoders.{}", level.as_str()), encoder));
    }

    errors
}

fn validate_encoder(prefix: &str, encoder: &EncoderConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if encoder.message_key.is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.message_key"),
            "must not be empty",
        ));
    }
    if encoder.separator.is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.separator"),
            "must not be empty",
        ));
    }
    if chrono::format::StrftimeItems::new(&encoder.time_format)
        .any(|item| matches!(item, chrono::format::Item::Error))
    {
        errors.push(ValidationError::new(
            format!("{prefix}.time_format"),
            format!("invalid layout {:?}", encoder.time_format),
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ObservabilityConfig::default()).is_ok());
    }

    #[test]
    fn file_without_directory_is_rejected() {
        let config = LoggerConfig {
            enable_file: true,
            ..LoggerConfig::default()
        };
        let errors = validate_logger(&config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "logger.log_dir");
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ObservabilityConfig::default();
        config.listener.bind_address = "nope".into();
        config.logger.retention_days = 0;
        config.logger.level_encoders.insert(
            LogLevel::Info,
            EncoderConfig {
                message_key: String::new(),
                separator: String::new(),
                ..EncoderConfig::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .any(|e| e.field == "logger.level_encoders.info.separator"));
    }
}
