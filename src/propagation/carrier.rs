//! Carrier abstractions over transport headers.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};

/// Read access to an inbound carrier.
pub trait Extractor {
    /// Value for `key`, if present. Multi-valued keys are joined.
    fn get(&self, key: &str) -> Option<String>;
}

/// Write access to an outbound carrier.
pub trait Injector {
    /// Set `key` to `value`, replacing previous values.
    fn set(&mut self, key: &str, value: String);
}

impl Extractor for HeaderMap {
    fn get(&self, key: &str) -> Option<String> {
        let joined: String = self
            .get_all(key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

impl Injector for HeaderMap {
    fn set(&mut self, key: &str, value: String) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            tracing::debug!(key, "Dropping propagation header that is not a valid HTTP header");
            return;
        };
        self.insert(name, value);
    }
}

impl Extractor for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

impl Injector for std::collections::HashMap<String, String> {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }
}
