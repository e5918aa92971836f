use crate::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Description of one logical request.
///
/// The method is kept as given and only validated at dispatch time, so an
/// unimplemented method surfaces as `Error::UnsupportedOperation`.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    /// Attach the stored bearer token, if any. Defaults to `true`.
    pub requires_auth: bool,
    /// Execute immediately, ignoring the concurrency budget.
    pub skip_queue: bool,
    /// Serve from / populate the response cache. Only honoured for GET.
    pub use_cache: bool,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: None,
            headers: BTreeMap::new(),
            requires_auth: true,
            skip_queue: false,
            use_cache: false,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new("POST", path).body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new("PUT", path).body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new("PATCH", path).body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize any `Serialize` payload as the JSON body.
    pub fn json<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn requires_auth(mut self, enable: bool) -> Self {
        self.requires_auth = enable;
        self
    }

    pub fn skip_queue(mut self, enable: bool) -> Self {
        self.skip_queue = enable;
        self
    }

    pub fn use_cache(mut self, enable: bool) -> Self {
        self.use_cache = enable;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
