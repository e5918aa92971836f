//! Mock HTTP server setup for integration tests

use guardlink::{ClientConfig, NetworkClient, NetworkClientBuilder};
use mockito::{Matcher, Mock, Server, ServerGuard};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    /// Config pointing at the mock server, without the default path prefix
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url).with_path_prefix("")
    }

    /// Client over the real reqwest transport, no background sweep
    pub async fn client(&self, config: ClientConfig) -> guardlink::Result<NetworkClient> {
        NetworkClientBuilder::new(config)
            .disable_background_sweep()
            .build()
            .await
    }

    /// Create a mock for a JSON response, expected exactly `hits` times
    pub async fn mock_json(&self, method: &str, path: &str, status: u16, body: &str, hits: usize) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock(method, path)
            .with_status(status.into())
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    /// Create a mock that only matches when the given header is present
    pub async fn mock_requiring_header(&self, path: &str, header: &str, value: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("GET", path)
            .match_header(header, value)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await
    }

    /// Create a mock that matches a JSON body exactly
    pub async fn mock_json_body(&self, method: &str, path: &str, body: serde_json::Value) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock(method, path)
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(body))
            .with_status(201)
            .with_body(r#"{"id":"a-1"}"#)
            .create_async()
            .await
    }
}
