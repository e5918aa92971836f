use crate::auth::{CredentialStore, InMemoryCredentialStore};
use crate::cache::ResponseCache;
use crate::client::core::{ClientInner, NetworkClient};
use crate::client::maintenance::spawn_sweeper;
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::metrics::MetricsRegistry;
use crate::resilience::admission::AdmissionController;
use crate::resilience::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::telemetry::{EventSink, TracingEventSink};
use crate::transport::{HttpTransport, Transport};
use crate::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builder for [`NetworkClient`].
///
/// Everything except the config has a production default: reqwest transport,
/// in-memory credentials, `tracing` event sink and the system clock.
pub struct NetworkClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    credentials: Arc<dyn CredentialStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    background_sweep: bool,
}

impl NetworkClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            credentials: Arc::new(InMemoryCredentialStore::new()),
            events: Arc::new(TracingEventSink),
            clock: Arc::new(SystemClock),
            background_sweep: true,
        }
    }

    /// Start from defaults overridden by `GUARDLINK_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env())
    }

    /// Replace the HTTP transport (mock servers, instrumented stacks).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = store;
        self
    }

    /// Inject an event sink. Default forwards events to `tracing`.
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Time source for breaker windows, cache TTL and metrics retention.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Do not spawn the periodic sweep; call
    /// [`NetworkClient::run_maintenance`] manually instead.
    pub fn disable_background_sweep(mut self) -> Self {
        self.background_sweep = false;
        self
    }

    /// Build the client. Must be called inside a tokio runtime when the
    /// background sweep is enabled.
    pub async fn build(self) -> Result<NetworkClient> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new()?),
        };

        let breaker_cfg = CircuitBreakerConfig::new()
            .with_failure_threshold(config.breaker_failure_threshold)
            .with_recovery_timeout(config.breaker_recovery_timeout());

        let inner = Arc::new(ClientInner {
            transport,
            credentials: self.credentials,
            events: self.events,
            cache: ResponseCache::new(
                config.cache_ttl(),
                config.max_cache_entries,
                self.clock.clone(),
            ),
            breakers: CircuitBreakerRegistry::new(breaker_cfg, self.clock.clone()),
            metrics: MetricsRegistry::new(self.clock.clone()),
            admission: AdmissionController::new(config.max_concurrent_requests),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
            clock: self.clock,
            config,
        });

        let sweep = inner.config.sweep_interval().filter(|_| self.background_sweep);
        if let Some(period) = sweep {
            spawn_sweeper(Arc::downgrade(&inner), period, inner.shutdown.clone());
        }

        info!(
            base_url = inner.config.base_url.as_str(),
            max_concurrent = inner.config.max_concurrent_requests,
            background_sweep = sweep.is_some(),
            "network client ready"
        );
        Ok(NetworkClient { inner })
    }
}
