use crate::clock::Clock;
use crate::endpoint::EndpointIdentity;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub endpoint: String,
    pub state: CircuitState,
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub consecutive_failures: u32,
    /// Remaining open time in ms, if currently open and still inside the recovery window.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure: None,
        }
    }
}

/// Per-endpoint circuit breakers, created lazily on first consultation.
///
/// - Counts consecutive failures per endpoint
/// - Opens once the count reaches the threshold
/// - After the recovery timeout, the next consultation moves the breaker to
///   half-open and lets the request through; no timers are involved
pub struct CircuitBreakerRegistry {
    cfg: CircuitBreakerConfig,
    breakers: Mutex<HashMap<EndpointIdentity, BreakerState>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(cfg: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            breakers: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EndpointIdentity, BreakerState>> {
        self.breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remaining_open(&self, st: &BreakerState, now: Instant) -> Option<Duration> {
        if st.state != CircuitState::Open {
            return None;
        }
        let since = now.saturating_duration_since(st.last_failure?);
        (since <= self.cfg.recovery_timeout).then(|| self.cfg.recovery_timeout - since)
    }

    /// True only while open and inside the recovery window. An open breaker
    /// whose window has elapsed becomes half-open here and is not blocked.
    /// Half-open never blocks, so concurrent callers all pass as trial requests.
    pub fn should_block(&self, endpoint: &EndpointIdentity) -> bool {
        self.remaining_block(endpoint).is_some()
    }

    /// Like [`should_block`](Self::should_block) but surfaces the rejection
    /// as a typed error.
    pub fn check(&self, endpoint: &EndpointIdentity) -> Result<()> {
        match self.remaining_block(endpoint) {
            Some(remaining) => Err(Error::CircuitOpen {
                endpoint: endpoint.to_string(),
                retry_after_ms: remaining.as_millis() as u64,
            }),
            None => Ok(()),
        }
    }

    fn remaining_block(&self, endpoint: &EndpointIdentity) -> Option<Duration> {
        let now = self.clock.now();
        let mut breakers = self.lock();
        let st = breakers
            .entry(endpoint.clone())
            .or_insert_with(BreakerState::new);

        if st.state != CircuitState::Open {
            return None;
        }
        match self.remaining_open(st, now) {
            Some(remaining) => Some(remaining),
            None => {
                st.state = CircuitState::HalfOpen;
                info!(endpoint = %endpoint, "circuit breaker half-open; allowing trial request");
                None
            }
        }
    }

    pub fn record_success(&self, endpoint: &EndpointIdentity) {
        let mut breakers = self.lock();
        let st = breakers
            .entry(endpoint.clone())
            .or_insert_with(BreakerState::new);
        st.consecutive_failures = 0;
        if st.state == CircuitState::HalfOpen {
            st.state = CircuitState::Closed;
            info!(endpoint = %endpoint, "circuit breaker closed after successful trial");
        }
    }

    pub fn record_failure(&self, endpoint: &EndpointIdentity) {
        let now = self.clock.now();
        let mut breakers = self.lock();
        let st = breakers
            .entry(endpoint.clone())
            .or_insert_with(BreakerState::new);
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        st.last_failure = Some(now);
        if st.consecutive_failures >= self.cfg.failure_threshold && st.state != CircuitState::Open {
            st.state = CircuitState::Open;
            warn!(
                endpoint = %endpoint,
                consecutive_failures = st.consecutive_failures,
                recovery_ms = self.cfg.recovery_timeout.as_millis() as u64,
                "circuit breaker opened"
            );
        }
    }

    /// Stored state; unknown endpoints read as closed.
    pub fn state(&self, endpoint: &EndpointIdentity) -> CircuitState {
        self.lock()
            .get(endpoint)
            .map(|st| st.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn snapshot(&self, endpoint: &EndpointIdentity) -> CircuitBreakerSnapshot {
        let now = self.clock.now();
        let breakers = self.lock();
        match breakers.get(endpoint) {
            Some(st) => self.snapshot_of(endpoint, st, now),
            None => self.snapshot_of(endpoint, &BreakerState::new(), now),
        }
    }

    /// All known breakers, sorted by endpoint.
    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        let now = self.clock.now();
        let breakers = self.lock();
        let mut out: Vec<CircuitBreakerSnapshot> = breakers
            .iter()
            .map(|(endpoint, st)| self.snapshot_of(endpoint, st, now))
            .collect();
        out.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        out
    }

    fn snapshot_of(
        &self,
        endpoint: &EndpointIdentity,
        st: &BreakerState,
        now: Instant,
    ) -> CircuitBreakerSnapshot {
        CircuitBreakerSnapshot {
            endpoint: endpoint.to_string(),
            state: st.state,
            failure_threshold: self.cfg.failure_threshold,
            recovery_timeout_ms: self.cfg.recovery_timeout.as_millis() as u64,
            consecutive_failures: st.consecutive_failures,
            open_remaining_ms: self
                .remaining_open(st, now)
                .map(|d| d.as_millis() as u64),
        }
    }

    /// Force an endpoint back to closed.
    pub fn reset(&self, endpoint: &EndpointIdentity) -> bool {
        self.lock().remove(endpoint).is_some()
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

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }
}
