//! Rolling per-endpoint counters and mean response time.

use crate::clock::Clock;
use crate::endpoint::EndpointIdentity;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: f64,
    pub last_updated: Instant,
}

impl EndpointMetrics {
    fn new(now: Instant) -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            average_response_time_ms: 0.0,
            last_updated: now,
        }
    }

    fn record(&mut self, success: bool, elapsed: Duration, now: Instant) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
        // avg' = (avg * (n - 1) + sample) / n with n already incremented
        let n = self.total_requests as f64;
        let sample = elapsed.as_secs_f64() * 1000.0;
        self.average_response_time_ms = (self.average_response_time_ms * (n - 1.0) + sample) / n;
        self.last_updated = now;
    }
}

/// Serializable view of [`EndpointMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct EndpointMetricsSnapshot {
    pub endpoint: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time_ms: f64,
    pub idle_ms: u64,
}

impl EndpointMetricsSnapshot {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }
}

/// Metrics for completed network attempts. Cache hits and breaker
/// rejections never reach this registry.
pub struct MetricsRegistry {
    endpoints: Mutex<HashMap<EndpointIdentity, EndpointMetrics>>,
    clock: Arc<dyn Clock>,
}

impl MetricsRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EndpointIdentity, EndpointMetrics>> {
        self.endpoints
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, endpoint: &EndpointIdentity, success: bool, elapsed: Duration) {
        let now = self.clock.now();
        self.lock()
            .entry(endpoint.clone())
            .or_insert_with(|| EndpointMetrics::new(now))
            .record(success, elapsed, now);
    }

    pub fn get(&self, endpoint: &EndpointIdentity) -> Option<EndpointMetrics> {
        self.lock().get(endpoint).cloned()
    }

    pub fn snapshot(&self, endpoint: &EndpointIdentity) -> Option<EndpointMetricsSnapshot> {
        let now = self.clock.now();
        self.lock()
            .get(endpoint)
            .map(|m| Self::snapshot_of(endpoint, m, now))
    }

    /// All endpoints, sorted by identity.
    pub fn all(&self) -> Vec<EndpointMetricsSnapshot> {
        let now = self.clock.now();
        let endpoints = self.lock();
        let mut out: Vec<EndpointMetricsSnapshot> = endpoints
            .iter()
            .map(|(endpoint, m)| Self::snapshot_of(endpoint, m, now))
            .collect();
        out.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        out
    }

    fn snapshot_of(
        endpoint: &EndpointIdentity,
        m: &EndpointMetrics,
        now: Instant,
    ) -> EndpointMetricsSnapshot {
        EndpointMetricsSnapshot {
            endpoint: endpoint.to_string(),
            total_requests: m.total_requests,
            successful_requests: m.successful_requests,
            failed_requests: m.failed_requests,
            average_response_time_ms: m.average_response_time_ms,
            idle_ms: now.saturating_duration_since(m.last_updated).as_millis() as u64,
        }
    }

    /// Drop endpoints not updated within `retention`. Returns the number removed.
    pub fn sweep(&self, retention: Duration) -> usize {
        let now = self.clock.now();
        let mut endpoints = self.lock();
        let before = endpoints.len();
        endpoints.retain(|_, m| now.saturating_duration_since(m.last_updated) <= retention);
        let removed = before - endpoints.len();
        if removed > 0 {
            debug!(removed, remaining = endpoints.len(), "stale endpoint metrics dropped");
        }
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
