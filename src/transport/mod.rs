//! 传输层：抽象出单次 HTTP 交换，默认实现基于共享的 reqwest 客户端。
//!
//! # Transport Module
//!
//! A transport performs exactly one physical HTTP exchange. It knows nothing
//! about caching, circuit breaking or admission control; the dispatcher in
//! [`crate::client`] layers those on top.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Transport`] | Trait implemented by every transport |
//! | [`HttpTransport`] | Production transport over one long-lived `reqwest::Client` |
//! | [`TransportRequest`] | Fully decorated outbound request |
//! | [`HttpResponse`] | Captured status, headers and body |

mod http;

pub use http::HttpTransport;

use crate::endpoint::HttpMethod;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// An outbound request after URL composition and header decoration.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// A captured HTTP response. Header names are lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Status below 400. Anything else counts as a failure for breaker purposes.
    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<HttpResponse, TransportError>;

    /// Release pooled connections. Called once when the client is disposed.
    async fn close(&self) {}
}
