//! HTTP access to the configuration service.
//! [`Transport`] owns the blocking client and the request scope, [`HttpSource`]
//! implements [`ConfigSource`] on top of it.

use crate::constants::{SCOPE_ENV_PREFIX, SCOPE_HEADER_PREFIX};
use crate::error::{Error, KeyKind, Result};
use crate::source::{ConfigSource, HashResult, ListResult, Response, StringResult};
use log::{debug, info, warn};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::time::Duration;
use url::Url;

pub const ACCEPT_JSON: &str = "application/json";
pub const ACCEPT_TEXT: &str = "text/plain";

/// Request scope sent with every call as `x-cfg-<name>` headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(BTreeMap<String, String>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects `CFG_*` variables (case-insensitive) from environment-style pairs.
    ///
    /// `CFG_DATACENTER=ams1` becomes the scope entry `datacenter = ams1`.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut scope = Self::new();
        for (name, value) in vars {
            let name = name.as_ref().to_lowercase();
            if let Some(scope_name) = name.strip_prefix(SCOPE_ENV_PREFIX) {
                if scope_name.is_empty() {
                    continue;
                }
                let value = value.into();
                info!("Using scope {}={}", scope_name, value);
                scope.insert(scope_name, value);
            }
        }
        scope
    }

    /// Scope from the process environment. Variables whose name or value
    /// is not valid UTF-8 are skipped.
    pub fn from_env() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    pub fn from_os_vars<I: IntoIterator<Item = (OsString, OsString)>>(vars: I) -> Self {
        Self::from_vars(
            vars.into_iter()
                .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?))),
        )
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.0 {
            let header = HeaderName::from_bytes(format!("{SCOPE_HEADER_PREFIX}{name}").as_bytes())
                .map_err(|e| Error::ConfigError(format!("invalid scope name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::ConfigError(format!("invalid scope value for '{name}': {e}")))?;
            headers.insert(header, value);
        }
        Ok(headers)
    }
}

/// Parses a `name=value` scope argument.
pub fn parse_scope_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_lowercase(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

/// Blocking HTTP transport bound to one service base URL.
#[derive(Debug, Clone)]
pub struct Transport {
    base: Url,
    client: Client,
}

impl Transport {
    pub fn new(base_url: &str, scope: &Scope, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::ConfigError(format!("invalid service URL '{base_url}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .default_headers(scope.headers()?)
            .build()
            .map_err(|e| Error::unavailable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { base, client })
    }

    /// URL of an endpoint below the base URL. Each part is split on `/` and
    /// every piece is percent-encoded as one path segment.
    pub fn endpoint(&self, parts: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::ConfigError(format!("service URL '{}' cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(parts.iter().flat_map(|part| part.split('/')));
        Ok(url)
    }

    /// Performs a GET. `Ok(None)` means the service answered 404.
    pub fn get(&self, parts: &[&str], accept: &str) -> Result<Option<String>> {
        let url = self.endpoint(parts)?;
        let request = self.client.get(url.clone()).header(ACCEPT, accept);
        self.execute(Method::GET, &url, request)
    }

    /// Sends a JSON body with the given method. `Ok(None)` means 404.
    pub fn send_json(&self, method: Method, parts: &[&str], body: String) -> Result<Option<String>> {
        let url = self.endpoint(parts)?;
        let request = self
            .client
            .request(method.clone(), url.clone())
            .header(CONTENT_TYPE, ACCEPT_JSON)
            .body(body);
        self.execute(method, &url, request)
    }

    pub fn delete(&self, parts: &[&str]) -> Result<Option<String>> {
        let url = self.endpoint(parts)?;
        let request = self.client.delete(url.clone());
        self.execute(Method::DELETE, &url, request)
    }

    fn execute(&self, method: Method, url: &Url, request: RequestBuilder) -> Result<Option<String>> {
        let response = request
            .send()
            .map_err(|e| Error::unavailable(format!("{method} {url} failed: {e}")))?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!("{} {} -> {}", method, url, status);
            return Ok(None);
        }
        if !status.is_success() {
            warn!("HTTP error: {} {} -> {}", method, url, status);
            return Err(Error::unavailable(format!("HTTP error {} from {method} {url}", status.as_u16())));
        }
        debug!("{} {} -> {}", method, url, status);

        response
            .text()
            .map(Some)
            .map_err(|e| Error::unavailable(format!("cannot read body of {method} {url}: {e}")))
    }
}

/// [`ConfigSource`] backed by the `/string`, `/list` and `/hash` endpoints.
#[derive(Debug, Clone)]
pub struct HttpSource {
    transport: Transport,
}

impl HttpSource {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    fn fetch(&self, kind: KeyKind, key: &str) -> Result<Response> {
        let namespace = kind.to_string();
        let body = self
            .transport
            .get(&[namespace.as_str(), key], ACCEPT_JSON)?
            .ok_or_else(|| Error::not_found(kind, key))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::unavailable(format!("invalid {kind} response for '{key}': {e}")))
    }
}

impl ConfigSource for HttpSource {
    fn get_string(&self, key: &str) -> Result<StringResult> {
        self.fetch(KeyKind::String, key)?.into_string(key)
    }

    fn get_list(&self, key: &str) -> Result<ListResult> {
        self.fetch(KeyKind::List, key)?.into_list(key)
    }

    fn get_hash(&self, key: &str) -> Result<HashResult> {
        self.fetch(KeyKind::Hash, key)?.into_hash(key)
    }
}
