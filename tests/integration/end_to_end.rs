use crate::mock_server::MockServerFixture;
use guardlink::auth::InMemoryCredentialStore;
use guardlink::resilience::circuit_breaker::CircuitState;
use guardlink::{Error, ErrorCategory, NetworkClientBuilder, RequestOptions};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize, PartialEq)]
struct Zone {
    id: u32,
    name: String,
}

#[tokio::test]
async fn test_get_decodes_json() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json("GET", "/zones", 200, r#"[{"id":1,"name":"park"}]"#, 1)
        .await;
    let client = fixture.client(fixture.config()).await.unwrap();

    let zones: Vec<Zone> = client.get("/zones").await.unwrap().json().unwrap();
    assert_eq!(zones, vec![Zone { id: 1, name: "park".into() }]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cached_get_hits_server_once() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_json("GET", "/contacts", 200, r#"{"n":3}"#, 1).await;
    let client = fixture.client(fixture.config()).await.unwrap();

    for _ in 0..3 {
        assert_eq!(client.get_cached("/contacts").await.unwrap().text(), r#"{"n":3}"#);
    }
    mock.assert_async().await;
    assert_eq!(client.signals().cache.stats.hits, 2);
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json_body("POST", "/alerts", json!({"kind": "sos", "lat": 1.5}))
        .await;
    let client = fixture.client(fixture.config()).await.unwrap();

    let resp = client
        .post("/alerts", json!({"lat": 1.5, "kind": "sos"}))
        .await
        .unwrap();
    assert_eq!(resp.status, 201);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_open_breaker() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture.mock_json("GET", "/ping", 500, r#"{"error":"down"}"#, 2).await;
    let client = fixture
        .client(fixture.config().with_breaker(2, 1))
        .await
        .unwrap();

    for _ in 0..2 {
        let err = client.get("/ping").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RejectedByServer);
        assert!(err.to_string().contains("down"));
    }
    let err = client.get("/ping").await.unwrap_err();
    assert!(matches!(err, Error::CircuitOpen { .. }));
    assert_eq!(err.category(), ErrorCategory::TemporarilyUnavailable);

    let ping = client.endpoint_for("GET", "/ping").unwrap();
    assert_eq!(client.breaker_state(&ping), CircuitState::Open);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_requiring_header("/me", "authorization", "Bearer live-token-0001")
        .await;
    let client = NetworkClientBuilder::new(fixture.config())
        .credential_store(Arc::new(InMemoryCredentialStore::with_token("live-token-0001")))
        .disable_background_sweep()
        .build()
        .await
        .unwrap();

    assert!(client.get("/me").await.is_ok());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_request_id_header_is_sent() {
    let fixture = MockServerFixture::new().await;
    let mock = {
        let mut server = fixture.server.lock().await;
        server
            .mock("GET", "/health")
            .match_header("x-request-id", mockito::Matcher::Regex(r"^\d+-[0-9a-f]{9}$".into()))
            .with_status(200)
            .create_async()
            .await
    };
    let client = fixture.client(fixture.config()).await.unwrap();
    client
        .execute(RequestOptions::get("/health").requires_auth(false))
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let fixture = MockServerFixture::new().await;
    let config = fixture
        .config()
        .with_default_timeout(Duration::from_secs(2));
    let client = fixture.client(config).await.unwrap();

    let err = client
        .get("http://127.0.0.1:9/unreachable")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. } | Error::Timeout { .. }));
    assert_eq!(err.category(), ErrorCategory::TemporarilyUnavailable);
}
