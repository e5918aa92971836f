use crate::cache::CacheStats;
use crate::metrics::EndpointMetricsSnapshot;
use crate::resilience::admission::AdmissionSnapshot;
use crate::resilience::circuit_breaker::{CircuitBreakerSnapshot, CircuitState};
use serde::Serialize;

/// A point-in-time view of the client's runtime "signals".
///
/// Facts only: applications decide what to do with an open breaker or a deep
/// queue. Serializes to JSON for diagnostics endpoints and the probe binary.
#[derive(Debug, Clone, Serialize)]
pub struct SignalsSnapshot {
    pub admission: AdmissionSnapshot,
    pub cache: CacheSignals,
    pub circuit_breakers: Vec<CircuitBreakerSnapshot>,
    pub endpoints: Vec<EndpointMetricsSnapshot>,
    pub disposed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSignals {
    pub entries: usize,
    pub max_entries: usize,
    pub stats: CacheStats,
}

impl SignalsSnapshot {
    /// Endpoints whose breaker currently rejects calls.
    pub fn open_circuits(&self) -> Vec<&str> {
        self.circuit_breakers
            .iter()
            .filter(|b| b.state == CircuitState::Open)
            .map(|b| b.endpoint.as_str())
            .collect()
    }
}
