//! # guardlink
//!
//! 面向移动端后端的弹性 HTTP 客户端核心：缓存、熔断、并发准入与端点指标。
//!
//! Resilient HTTP client core for a safety app's backend calls. Every remote
//! call goes through one [`NetworkClient`], which layers a response cache,
//! per-endpoint circuit breakers, a bounded admission queue and rolling
//! endpoint metrics over a single shared connection pool.
//!
//! ## Key Features
//!
//! - **Response cache**: GET responses keyed by method, URL and canonical JSON body,
//!   with a TTL and an entry cap ([`cache`])
//! - **Circuit breakers**: one per endpoint, `Closed -> Open -> HalfOpen` ([`resilience`])
//! - **Admission control**: at most N requests on the wire, FIFO queue for the rest
//! - **Metrics**: per-endpoint counters and mean response time ([`metrics`])
//! - **Events**: typed lifecycle events through a pluggable sink ([`telemetry`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guardlink::{ClientConfig, NetworkClientBuilder, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> guardlink::Result<()> {
//!     let client = NetworkClientBuilder::new(ClientConfig::new("https://api.example.com"))
//!         .build()
//!         .await?;
//!
//!     let zones = client.get_cached("/zones").await?;
//!     println!("{}", zones.text());
//!
//!     let alert = RequestOptions::post("/alerts", serde_json::json!({"kind": "sos"}))
//!         .skip_queue(true);
//!     client.execute(alert).await?;
//!
//!     client.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Dispatcher, builder, request options and signals |
//! | [`cache`] | Cache keys and the TTL response store |
//! | [`resilience`] | Circuit breaker registry and admission controller |
//! | [`metrics`] | Per-endpoint counters |
//! | [`transport`] | Transport trait and the reqwest implementation |
//! | [`auth`] | Bearer credential stores |
//! | [`telemetry`] | Lifecycle events and sinks |
//! | [`config`] | Defaults, YAML and environment configuration |
//! | [`endpoint`] | HTTP methods, endpoint identity and URL composition |
//! | [`clock`] | Injectable time source |

pub mod auth;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod endpoint;
pub mod metrics;
pub mod resilience;
pub mod telemetry;
pub mod transport;

// Re-export main types for convenience
pub use client::{NetworkClient, NetworkClientBuilder, RequestOptions, SignalsSnapshot};
pub use config::ClientConfig;
pub use endpoint::{EndpointIdentity, HttpMethod};
pub use transport::HttpResponse;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorCategory, ErrorContext};
