//! Admin operations against the `/admin` endpoints of the configuration service.

use crate::error::{Error, KeyKind, Result};
use crate::http::{Transport, ACCEPT_JSON, ACCEPT_TEXT};
use log::{debug, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// A key as stored by the service: its type and raw data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Serialize)]
struct DataRequest<'a> {
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct StringKeyRequest<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    data: &'a str,
}

/// Client for reading and modifying keys.
#[derive(Debug, Clone)]
pub struct AdminClient {
    transport: Transport,
}

impl AdminClient {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    fn get_json<T: DeserializeOwned>(&self, parts: &[&str], key: &str) -> Result<T> {
        let body = self
            .transport
            .get(parts, ACCEPT_JSON)?
            .ok_or_else(|| Error::not_found(KeyKind::Any, key))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::unavailable(format!("invalid response from /{}: {e}", parts.join("/"))))
    }

    fn send(&self, method: Method, parts: &[&str], key: &str, body: String) -> Result<()> {
        self.transport
            .send_json(method, parts, body)?
            .map(|_| ())
            .ok_or_else(|| Error::not_found(KeyKind::Any, key))
    }

    fn encode<T: Serialize>(value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::AdminError(format!("cannot encode request: {e}")))
    }

    pub fn get_key_text(&self, key: &str) -> Result<String> {
        self.transport
            .get(&["admin", "key", key], ACCEPT_TEXT)?
            .ok_or_else(|| Error::not_found(KeyKind::Any, key))
    }

    pub fn get_key_json(&self, key: &str) -> Result<KeyDocument> {
        self.get_json(&["admin", "key", key], key)
    }

    pub fn key_type(&self, key: &str) -> Result<String> {
        let envelope: DataEnvelope<String> = self.get_json(&["admin", "util", "type", key], key)?;
        Ok(envelope.data)
    }

    pub fn get_hash_field(&self, key: &str, field: &str) -> Result<String> {
        let envelope: DataEnvelope<String> = self.get_json(&["admin", "key", key, field], key)?;
        Ok(envelope.data)
    }

    pub fn get_list_index(&self, key: &str, index: usize) -> Result<String> {
        let index = index.to_string();
        let envelope: DataEnvelope<String> = self.get_json(&["admin", "key", key, "index", index.as_str()], key)?;
        Ok(envelope.data)
    }

    /// Lists keys matching `filter`; an empty filter lists everything.
    pub fn list_keys(&self, filter: &str) -> Result<Vec<String>> {
        let envelope: DataEnvelope<Vec<String>> = if filter.is_empty() {
            self.get_json(&["admin", "keys"], filter)?
        } else {
            self.get_json(&["admin", "keys", filter], filter)?
        };
        Ok(envelope.data)
    }

    pub fn list_hash_fields(&self, key: &str) -> Result<Vec<String>> {
        let envelope: DataEnvelope<Vec<String>> =
            self.get_json(&["admin", "util", "hashfields", key], key)?;
        Ok(envelope.data)
    }

    /// Replaces a key with a raw JSON document.
    pub fn set_key_from_json(&self, key: &str, json: &str) -> Result<()> {
        if json.trim().is_empty() {
            return Err(Error::AdminError("refusing to set a key from empty input".to_string()));
        }
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|e| Error::AdminError(format!("input is not valid JSON: {e}")))?;
        self.send(Method::POST, &["admin", "key", key], key, json.to_string())
    }

    /// Sets a string key, creating it when absent.
    ///
    /// # Errors
    /// * `Error::AdminError` if the key exists with a type other than string
    pub fn set_string(&self, key: &str, value: &str) -> Result<()> {
        let kind = match self.key_type(key) {
            Ok(kind) => kind,
            Err(Error::NotFound { .. }) => {
                debug!("Key {} does not exist, creating string key", key);
                "string".to_string()
            }
            Err(err) => return Err(err),
        };
        if kind != "string" {
            return Err(Error::AdminError(format!(
                "can only set keys of type 'string' via parameter, '{key}' is '{kind}'"
            )));
        }
        let body = Self::encode(&StringKeyRequest { kind: "string", data: value })?;
        self.send(Method::POST, &["admin", "key", key], key, body)
    }

    pub fn set_hash_field(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let body = Self::encode(&DataRequest { data: value })?;
        self.send(Method::POST, &["admin", "key", key, field], key, body)
    }

    /// Appends to a list, creating it when absent.
    pub fn list_append(&self, key: &str, value: &str) -> Result<()> {
        let body = Self::encode(&DataRequest { data: value })?;
        self.send(Method::PATCH, &["admin", "key", "append", key], key, body)
    }

    pub fn delete_key(&self, key: &str) -> Result<()> {
        self.transport
            .delete(&["admin", "key", key])?
            .map(|_| ())
            .ok_or_else(|| Error::not_found(KeyKind::Any, key))
    }

    /// Writes every key as pretty JSON to `<output>/<key>`. Returns the
    /// number of keys written.
    pub fn dump_keys<P: AsRef<Path>>(&self, output: P) -> Result<usize> {
        let output = output.as_ref();
        std::fs::create_dir_all(output)?;

        let mut written = 0;
        for key in self.list_keys("*")? {
            let relative = Path::new(&key);
            let escapes = relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if escapes {
                warn!("Skipping key {} that does not map to a file inside {}", key, output.display());
                continue;
            }

            debug!("Dumping key {}", key);
            let document = self.get_key_json(&key)?;
            let json = serde_json::to_string_pretty(&document)
                .map_err(|e| Error::AdminError(format!("cannot encode key '{key}': {e}")))?;

            let local = output.join(relative);
            if let Some(parent) = local.parent() {
                std::fs::create_dir_all(parent)?;
            }
            debug!("Writing {} bytes to {}", json.len(), local.display());
            std::fs::write(&local, json)?;
            written += 1;
        }
        Ok(written)
    }
}
