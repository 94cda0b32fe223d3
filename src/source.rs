//! Configuration sources.
//! Defines the value shapes returned by the configuration service, the
//! [`ConfigSource`] trait the rendering pipeline consumes, and an in-memory
//! implementation backed by snapshot files.

use crate::config::load_structured;
use crate::error::{Error, KeyKind, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// A value together with the tier that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueWithProvenance {
    pub value: String,
    pub source: String,
}

impl ValueWithProvenance {
    pub fn new<V: Into<String>, S: Into<String>>(value: V, source: S) -> Self {
        Self { value: value.into(), source: source.into() }
    }
}

pub type StringResult = ValueWithProvenance;
pub type ListResult = Vec<ValueWithProvenance>;
pub type HashResult = IndexMap<String, ValueWithProvenance>;

/// Body of a successful read from the service.
///
/// Matches `{"type": "string" | "list" | "hash", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Response {
    String(StringResult),
    List(ListResult),
    Hash(HashResult),
}

impl Response {
    fn kind(&self) -> KeyKind {
        match self {
            Response::String(_) => KeyKind::String,
            Response::List(_) => KeyKind::List,
            Response::Hash(_) => KeyKind::Hash,
        }
    }

    fn mismatch(&self, key: &str, expected: KeyKind) -> Error {
        Error::unavailable(format!(
            "expected {expected} response for '{key}', got {}",
            self.kind()
        ))
    }

    pub fn into_string(self, key: &str) -> Result<StringResult> {
        match self {
            Response::String(v) => Ok(v),
            other => Err(other.mismatch(key, KeyKind::String)),
        }
    }

    pub fn into_list(self, key: &str) -> Result<ListResult> {
        match self {
            Response::List(v) => Ok(v),
            other => Err(other.mismatch(key, KeyKind::List)),
        }
    }

    pub fn into_hash(self, key: &str) -> Result<HashResult> {
        match self {
            Response::Hash(v) => Ok(v),
            other => Err(other.mismatch(key, KeyKind::Hash)),
        }
    }
}

/// Read access to a key/value configuration store.
///
/// Implementations return [`Error::NotFound`] when the key is absent and
/// [`Error::SourceUnavailable`] for any transport or protocol failure.
pub trait ConfigSource: Send + Sync {
    fn get_string(&self, key: &str) -> Result<StringResult>;
    fn get_list(&self, key: &str) -> Result<ListResult>;
    fn get_hash(&self, key: &str) -> Result<HashResult>;
}

/// In-memory configuration source.
///
/// Snapshot files use one map per namespace:
///
/// ```json
/// {
///   "strings": { "db/host": { "value": "db1", "source": "prod" } },
///   "lists":   { "dns": [ { "value": "10.0.0.1", "source": "site" } ] },
///   "hashes":  { "limits": { "nofile": { "value": "4096", "source": "base" } } }
/// }
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySource {
    strings: HashMap<String, StringResult>,
    lists: HashMap<String, ListResult>,
    hashes: HashMap<String, HashResult>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot file (JSON, YAML or TOML, chosen by extension).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        load_structured(path, &content)
            .map_err(|reason| Error::ConfigError(format!("invalid snapshot '{}': {reason}", path.display())))
    }

    pub fn with_string(mut self, key: &str, value: &str, source: &str) -> Self {
        self.strings.insert(key.to_string(), ValueWithProvenance::new(value, source));
        self
    }

    pub fn with_list(mut self, key: &str, values: &[(&str, &str)]) -> Self {
        let list = values.iter().map(|(v, s)| ValueWithProvenance::new(*v, *s)).collect();
        self.lists.insert(key.to_string(), list);
        self
    }

    pub fn with_hash(mut self, key: &str, fields: &[(&str, &str, &str)]) -> Self {
        let hash = fields
            .iter()
            .map(|(f, v, s)| (f.to_string(), ValueWithProvenance::new(*v, *s)))
            .collect();
        self.hashes.insert(key.to_string(), hash);
        self
    }
}

impl ConfigSource for MemorySource {
    fn get_string(&self, key: &str) -> Result<StringResult> {
        self.strings.get(key).cloned().ok_or_else(|| Error::not_found(KeyKind::String, key))
    }

    fn get_list(&self, key: &str) -> Result<ListResult> {
        self.lists.get(key).cloned().ok_or_else(|| Error::not_found(KeyKind::List, key))
    }

    fn get_hash(&self, key: &str) -> Result<HashResult> {
        self.hashes.get(key).cloned().ok_or_else(|| Error::not_found(KeyKind::Hash, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_shapes() {
        let s: Response =
            serde_json::from_str(r#"{"type":"string","data":{"value":"v","source":"s"}}"#).unwrap();
        assert_eq!(s, Response::String(ValueWithProvenance::new("v", "s")));

        let l: Response = serde_json::from_str(
            r#"{"type":"list","data":[{"value":"a","source":"s"},{"value":"b","source":"t"}]}"#,
        )
        .unwrap();
        let list = l.into_list("k").unwrap();
        assert_eq!(list[1], ValueWithProvenance::new("b", "t"));

        let h: Response = serde_json::from_str(
            r#"{"type":"hash","data":{"f":{"value":"v","source":"s"}}}"#,
        )
        .unwrap();
        assert!(h.into_string("k").is_err());
    }

    #[test]
    fn test_memory_source_not_found_kind() {
        let source = MemorySource::new().with_string("a", "1", "t");
        assert_eq!(source.get_string("a").unwrap().value, "1");
        match source.get_list("a") {
            Err(Error::NotFound { kind: KeyKind::List, key }) => assert_eq!(key, "a"),
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }
}
