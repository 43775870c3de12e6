//! Access records extended with named fields computed per emission.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::logging::{LogLevel, LogType, Logger};
use crate::propagation::{span_id_of, trace_id_of, SpanContext};
use crate::record::format::{or_empty, TraceFields, LOG_TYPE_FIELD};
use crate::record::AccessLog;

/// Computes one extra field from the active context.
pub type FieldAccessor = Arc<dyn Fn(Option<&SpanContext>) -> String + Send + Sync>;

/// Extra fields of a union record, kept sorted by name.
#[derive(Clone)]
pub struct ExtraFields {
    accessors: BTreeMap<String, FieldAccessor>,
}

impl ExtraFields {
    /// No fields at all.
    pub fn empty() -> Self {
        Self {
            accessors: BTreeMap::new(),
        }
    }

    /// Register `name`, replacing an accessor of the same name.
    pub fn insert<F>(&mut self, name: impl Into<String>, accessor: F)
    where
        F: Fn(Option<&SpanContext>) -> String + Send + Sync + 'static,
    {
        self.accessors.insert(name.into(), Arc::new(accessor));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.accessors.keys().map(String::as_str)
    }

    /// Evaluate every accessor once, in name order.
    pub fn evaluate(&self, ctx: Option<&SpanContext>) -> Vec<(String, String)> {
        self.accessors
            .iter()
            .map(|(name, accessor)| (name.clone(), accessor(ctx)))
            .collect()
    }
}

impl Default for ExtraFields {
    /// `trace_id` and `span_id`.
    fn default() -> Self {
        let mut fields = Self::empty();
        fields.insert("trace_id", trace_id_of);
        fields.insert("span_id", span_id_of);
        fields
    }
}

impl fmt::Debug for ExtraFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.accessors.keys()).finish()
    }
}

/// Access record followed by `key=value` extra fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionLog {
    pub access: AccessLog,
}

impl UnionLog {
    pub fn new(access: AccessLog) -> Self {
        Self { access }
    }

    pub fn line(&self, service: &str, extra: &[(String, String)]) -> String {
        let mut line = self.access.line(service, TraceFields::Omit);
        for (name, value) in extra {
            line.push(' ');
            line.push_str(name);
            line.push('=');
            line.push_str(or_empty(value));
        }
        line
    }

    pub fn fields(&self, service: &str, extra: &[(String, String)]) -> Map<String, Value> {
        let mut fields = self.access.fields(service, TraceFields::Omit);
        fields.insert(LOG_TYPE_FIELD.into(), LogType::Union.as_str().into());
        for (name, value) in extra {
            fields.insert(name.clone(), Value::String(value.clone()));
        }
        fields
    }

    /// Emit with extra fields evaluated against `ctx`.
    #[track_caller]
    pub fn log(&self, logger: &Logger, ctx: Option<&SpanContext>) {
        self.log_at(logger, LogLevel::Info, ctx);
    }

    #[track_caller]
    pub fn log_at(&self, logger: &Logger, level: LogLevel, ctx: Option<&SpanContext>) {
        let extra = logger.extra_fields().evaluate(ctx);
        logger.emit(
            level,
            || self.line(logger.service_name(), &extra),
            || self.fields(logger.service_name(), &extra),
        );
    }
}
