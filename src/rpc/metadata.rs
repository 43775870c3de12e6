//! RPC call metadata.

use std::collections::BTreeMap;

use crate::propagation::{Extractor, Injector};

/// Multi-valued call metadata with case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, Vec<String>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `key`.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.to_ascii_lowercase(), vec![value.into()]);
    }

    /// Add a value to `key`.
    pub fn append(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn remove(&mut self, key: &str) -> Vec<String> {
        self.entries
            .remove(&key.to_ascii_lowercase())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut metadata = Metadata::new();
        for (key, value) in iter {
            metadata.append(key.as_ref(), value);
        }
        metadata
    }
}

impl Extractor for Metadata {
    fn get(&self, key: &str) -> Option<String> {
        let joined = self.get_all(key).concat();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}

impl Injector for Metadata {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key, value);
    }
}
