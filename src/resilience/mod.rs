//! 弹性模式模块：按端点熔断与全局并发准入控制。
//!
//! # Resilience Primitives Module
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Per-endpoint circuit breakers with lazy half-open probing |
//! | [`admission`] | Shared in-flight budget with a FIFO overflow queue |
//!
//! ## Circuit Breaker
//!
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Failures reached the threshold, requests fail fast
//! - **Half-Open**: Recovery window elapsed; the next request is a trial
//!
//! ```rust
//! use guardlink::clock::SystemClock;
//! use guardlink::endpoint::{EndpointIdentity, HttpMethod};
//! use guardlink::resilience::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(3)
//!     .with_recovery_timeout(Duration::from_secs(300));
//! let breakers = CircuitBreakerRegistry::new(config, Arc::new(SystemClock));
//! let ping = EndpointIdentity::new(HttpMethod::Get, "https://api.example.com/ping");
//!
//! if !breakers.should_block(&ping) {
//!     // Make the call...
//!     breakers.record_success(&ping);
//! }
//! ```
//!
//! ## Admission Control
//!
//! ```rust
//! use guardlink::resilience::admission::AdmissionController;
//!
//! let admission: AdmissionController<&str> = AdmissionController::new(5);
//! if admission.try_acquire() {
//!     // Proceed with request, then hand the slot back.
//!     admission.release();
//! }
//! ```

pub mod admission;
pub mod circuit_breaker;
