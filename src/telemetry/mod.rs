//! 遥测模块：请求生命周期事件与可插拔的事件接收端。
//!
//! Request lifecycle events.
//!
//! The dispatcher reports one event per notable step of a logical request to
//! an injected [`EventSink`]. The default sink forwards everything to
//! `tracing`; applications can plug in their own sink (or several) without
//! touching the client.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ClientEvent`] | Typed lifecycle event |
//! | [`EventSink`] | Trait for event destinations |
//! | [`TracingEventSink`] | Default sink, emits structured `tracing` records |
//! | [`NoopEventSink`] | Discards everything |
//! | [`InMemoryEventSink`] | Bounded in-memory sink for tests |
//! | [`CompositeEventSink`] | Fan-out to multiple sinks |

use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    RequestStarted {
        request_id: String,
        endpoint: String,
        /// Masked bearer token, when one was attached.
        credential: Option<String>,
    },
    ResponseReceived {
        request_id: String,
        endpoint: String,
        status: u16,
        elapsed_ms: u64,
    },
    RequestFailed {
        request_id: String,
        endpoint: String,
        error: String,
        category: String,
        elapsed_ms: u64,
    },
    CacheHit {
        endpoint: String,
    },
    CircuitRejected {
        endpoint: String,
        retry_after_ms: u64,
    },
    Queued {
        endpoint: String,
        queue_depth: usize,
    },
}

impl ClientEvent {
    pub fn endpoint(&self) -> &str {
        match self {
            ClientEvent::RequestStarted { endpoint, .. }
            | ClientEvent::ResponseReceived { endpoint, .. }
            | ClientEvent::RequestFailed { endpoint, .. }
            | ClientEvent::CacheHit { endpoint }
            | ClientEvent::CircuitRejected { endpoint, .. }
            | ClientEvent::Queued { endpoint, .. } => endpoint,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ClientEvent::RequestStarted { request_id, .. }
            | ClientEvent::ResponseReceived { request_id, .. }
            | ClientEvent::RequestFailed { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn report(&self, event: ClientEvent) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn report(&self, _event: ClientEvent) -> Result<()> {
        Ok(())
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoopEventSink)
}

/// Structured `tracing` output for every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn report(&self, event: ClientEvent) -> Result<()> {
        match &event {
            ClientEvent::RequestStarted {
                request_id,
                endpoint,
                credential,
            } => debug!(
                request_id = request_id.as_str(),
                endpoint = endpoint.as_str(),
                credential = credential.as_deref().unwrap_or("none"),
                "request started"
            ),
            ClientEvent::ResponseReceived {
                request_id,
                endpoint,
                status,
                elapsed_ms,
            } => info!(
                request_id = request_id.as_str(),
                endpoint = endpoint.as_str(),
                status,
                elapsed_ms,
                "response received"
            ),
            ClientEvent::RequestFailed {
                request_id,
                endpoint,
                error,
                category,
                elapsed_ms,
            } => warn!(
                request_id = request_id.as_str(),
                endpoint = endpoint.as_str(),
                category = category.as_str(),
                elapsed_ms,
                error = error.as_str(),
                "request failed"
            ),
            ClientEvent::CacheHit { endpoint } => {
                debug!(endpoint = endpoint.as_str(), "served from cache")
            }
            ClientEvent::CircuitRejected {
                endpoint,
                retry_after_ms,
            } => warn!(
                endpoint = endpoint.as_str(),
                retry_after_ms, "rejected by open circuit breaker"
            ),
            ClientEvent::Queued {
                endpoint,
                queue_depth,
            } => debug!(
                endpoint = endpoint.as_str(),
                queue_depth, "request queued awaiting admission"
            ),
        }
        Ok(())
    }
}

/// In-memory sink for testing.
pub struct InMemoryEventSink {
    events: RwLock<Vec<ClientEvent>>,
    max_events: usize,
}

impl InMemoryEventSink {
    pub fn new(max: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events: max.max(1),
        }
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_for_endpoint(&self, endpoint: &str) -> Vec<ClientEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.endpoint() == endpoint)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn report(&self, event: ClientEvent) -> Result<()> {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
            if events.len() > self.max_events {
                events.remove(0);
            }
        }
        Ok(())
    }
}

/// Composite sink for multiple destinations.
#[derive(Default)]
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn report(&self, event: ClientEvent) -> Result<()> {
        for s in &self.sinks {
            let _ = s.report(event.clone()).await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        for s in &self.sinks {
            let _ = s.close().await;
        }
        Ok(())
    }
}
