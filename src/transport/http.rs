use super::{HttpResponse, Transport, TransportError, TransportRequest};
use crate::endpoint::HttpMethod;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::Proxy;
use std::collections::BTreeMap;
use std::env;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info};

/// Transport over a single shared `reqwest::Client`.
///
/// The connection pool lives until [`Transport::close`]; deadlines are enforced
/// by the dispatcher, so the client itself only carries a connect timeout.
pub struct HttpTransport {
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Minimal production-friendly defaults (env-overridable).
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(
                env::var("GUARDLINK_HTTP_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(10),
            ))
            .pool_max_idle_per_host(
                env::var("GUARDLINK_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(8),
            )
            .pool_idle_timeout(Some(Duration::from_secs(
                env::var("GUARDLINK_HTTP_POOL_IDLE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(90),
            )))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Ok(proxy_url) = env::var("GUARDLINK_PROXY_URL") {
            if let Ok(proxy) = Proxy::all(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("cannot build HTTP client: {}", e),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self::with_client(client))
    }

    /// Wrap an already configured client (custom TLS roots, test setups).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Cheap handle clone so the lock is never held across an await.
    fn client(&self) -> std::result::Result<reqwest::Client, TransportError> {
        self.client
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or_else(|| TransportError::Other("transport closed".to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let client = self.client()?;
        let url = request.url.as_str();
        let mut req = match request.method {
            HttpMethod::Get => client.get(url),
            HttpMethod::Post => client.post(url),
            HttpMethod::Put => client.put(url),
            HttpMethod::Patch => client.patch(url),
            HttpMethod::Delete => client.delete(url),
        };

        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();

        let mut headers = BTreeMap::new();
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        let body = resp.bytes().await?;
        debug!(
            method = request.method.as_str(),
            url,
            status,
            bytes = body.len(),
            "http exchange complete"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn close(&self) {
        let client = self
            .client
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if client.is_some() {
            info!("http transport closed; pooled connections dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: HttpMethod, url: String, body: Option<&str>) -> TransportRequest {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("x-request-id".to_string(), "1-abc".to_string());
        TransportRequest {
            method,
            url,
            headers,
            body: body.map(|b| bytes::Bytes::from(b.to_string())),
        }
    }

    #[tokio::test]
    async fn test_get_captures_status_headers_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/zones")
            .match_header("x-request-id", "1-abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("X-Upstream", "edge-1")
            .with_body(r#"{"zones":[]}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let resp = transport
            .send(request(
                HttpMethod::Get,
                format!("{}/api/v1/zones", server.url()),
                None,
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("x-upstream"), Some("edge-1"));
        assert_eq!(resp.text(), r#"{"zones":[]}"#);
    }

    #[tokio::test]
    async fn test_post_sends_body_and_keeps_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/alerts")
            .match_body(r#"{"kind":"panic"}"#)
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let resp = transport
            .send(request(
                HttpMethod::Post,
                format!("{}/alerts", server.url()),
                Some(r#"{"kind":"panic"}"#),
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(resp.status, 503);
        assert!(!resp.is_success());
        assert_eq!(resp.text(), "overloaded");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = HttpTransport::new().unwrap();
        // Port 9 (discard) is essentially never listening on test hosts.
        let err = transport
            .send(request(HttpMethod::Get, "http://127.0.0.1:9/".into(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/zones")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let transport = HttpTransport::new().unwrap();
        let url = format!("{}/zones", server.url());
        assert!(transport.send(request(HttpMethod::Get, url.clone(), None)).await.is_ok());

        transport.close().await;
        transport.close().await;
        assert!(transport.is_closed());

        let err = transport
            .send(request(HttpMethod::Get, url, None))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Other(ref msg) if msg == "transport closed"));
        mock.assert_async().await;
    }
}
