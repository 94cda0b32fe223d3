//! Lookup policies applied on top of a [`ConfigSource`].
//!
//! String lookups degrade to a default value, list and hash lookups fail
//! fast, and existence probes turn every failure into `false`. Nothing in
//! here knows about the template engine; see [`crate::renderer`] for the
//! binding layer.

use crate::constants::DEFAULT_SOURCE;
use crate::error::{Error, KeyKind, Result};
use crate::source::{ConfigSource, ValueWithProvenance};
use log::debug;
use serde::Serialize;
use std::sync::Arc;

/// One hash field as exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPair {
    pub key: String,
    pub value: String,
    pub source: String,
}

/// Resolves keys against a shared configuration source.
#[derive(Clone)]
pub struct ValueResolver {
    source: Arc<dyn ConfigSource>,
}

impl ValueResolver {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self { source }
    }

    /// String value of `key`, or `default` (empty when absent) if the lookup
    /// fails or yields an empty value. Never fails.
    pub fn key(&self, key: &str, default: Option<&str>) -> String {
        match self.source.get_string(key) {
            Ok(found) if !found.value.is_empty() => {
                debug!("Got string val key={} source={}", key, found.source);
                found.value
            }
            Ok(_) => {
                debug!("Got string val key={} source={} (empty)", key, DEFAULT_SOURCE);
                default.unwrap_or_default().to_string()
            }
            Err(err) => {
                debug!("Got string val key={} source={} ({})", key, DEFAULT_SOURCE, err);
                default.unwrap_or_default().to_string()
            }
        }
    }

    /// Like [`ValueResolver::key`] but keeps the provenance.
    ///
    /// Without a default, lookup errors are returned to the caller and an
    /// empty value is passed through unchanged.
    pub fn key_with_provenance(&self, key: &str, default: Option<&str>) -> Result<ValueWithProvenance> {
        match (self.source.get_string(key), default) {
            (Ok(found), Some(default)) if found.value.is_empty() => {
                debug!("Got string val key={} source={} (empty)", key, DEFAULT_SOURCE);
                Ok(ValueWithProvenance::new(default, DEFAULT_SOURCE))
            }
            (Ok(found), _) => {
                debug!("Got string val key={} source={}", key, found.source);
                Ok(found)
            }
            (Err(err), Some(default)) => {
                debug!("Got string val key={} source={} ({})", key, DEFAULT_SOURCE, err);
                Ok(ValueWithProvenance::new(default, DEFAULT_SOURCE))
            }
            (Err(err), None) => Err(err),
        }
    }

    pub fn list_with_provenance(&self, key: &str) -> Result<Vec<ValueWithProvenance>> {
        let entries = self.source.get_list(key)?;
        for (index, entry) in entries.iter().enumerate() {
            debug!("Got list entry key={} index={} source={}", key, index, entry.source);
        }
        Ok(entries)
    }

    pub fn list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.list_with_provenance(key)?.into_iter().map(|entry| entry.value).collect())
    }

    pub fn list_joined(&self, key: &str, separator: &str) -> Result<String> {
        Ok(self.list(key)?.join(separator))
    }

    /// Value at `index`; an index past the end is reported as not found.
    pub fn list_index(&self, key: &str, index: usize) -> Result<String> {
        self.list(key)?
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::not_found(KeyKind::List, format!("{key}[{index}]")))
    }

    /// Hash fields as `(field, value, source)` triples in source order.
    pub fn hash(&self, key: &str) -> Result<Vec<KeyPair>> {
        let fields = self.source.get_hash(key)?;
        Ok(fields
            .into_iter()
            .map(|(field, entry)| {
                debug!("Got hash key key={} field={} source={}", key, field, entry.source);
                KeyPair { key: field, value: entry.value, source: entry.source }
            })
            .collect())
    }

    pub fn string_exists(&self, key: &str) -> bool {
        self.source.get_string(key).is_ok()
    }

    pub fn list_exists(&self, key: &str) -> bool {
        self.source.get_list(key).is_ok()
    }

    pub fn hash_exists(&self, key: &str) -> bool {
        self.source.get_hash(key).is_ok()
    }
}
