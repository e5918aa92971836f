use crate::auth::{mask_token, CredentialStore};
use crate::cache::{CacheKey, ResponseCache};
use crate::client::request::RequestOptions;
use crate::client::signals::{CacheSignals, SignalsSnapshot};
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::endpoint::{compose_url, EndpointIdentity, HttpMethod};
use crate::metrics::{EndpointMetricsSnapshot, MetricsRegistry};
use crate::resilience::admission::AdmissionController;
use crate::resilience::circuit_breaker::{CircuitBreakerRegistry, CircuitState};
use crate::telemetry::{ClientEvent, EventSink};
use crate::transport::{HttpResponse, Transport, TransportRequest};
use crate::{Error, Result};
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A logical request after validation and URL composition.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub endpoint: EndpointIdentity,
    pub body: Option<serde_json::Value>,
    pub headers: BTreeMap<String, String>,
    pub requires_auth: bool,
    pub skip_queue: bool,
    /// Present only for cacheable GETs.
    pub cache_key: Option<CacheKey>,
    pub timeout: Duration,
}

/// A request waiting for an admission slot, with the handle its caller awaits.
pub(crate) struct QueuedRequest {
    pub request: PreparedRequest,
    pub responder: oneshot::Sender<Result<HttpResponse>>,
}

/// One held admission slot. Dropping it releases the slot and starts whatever
/// queued work the freed capacity admits.
pub(crate) struct AdmissionSlot {
    inner: Arc<ClientInner>,
}

impl AdmissionSlot {
    fn new(inner: &Arc<ClientInner>) -> Self {
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        self.inner.finish_slot();
    }
}

pub(crate) struct ClientInner {
    pub config: ClientConfig,
    pub transport: Arc<dyn Transport>,
    pub credentials: Arc<dyn CredentialStore>,
    pub events: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
    pub cache: ResponseCache,
    pub breakers: CircuitBreakerRegistry,
    pub metrics: MetricsRegistry,
    pub admission: AdmissionController<QueuedRequest>,
    pub shutdown: CancellationToken,
    pub disposed: AtomicBool,
}

/// Resilient client every remote call is routed through.
///
/// Cloning is cheap and every clone shares the same cache, breakers, metrics,
/// admission budget and connection pool. Construct one per process with
/// [`NetworkClientBuilder`](crate::client::NetworkClientBuilder) and pass it
/// to the components that need it.
#[derive(Clone)]
pub struct NetworkClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl NetworkClient {
    /// Execute one logical request.
    ///
    /// Order of checks: method validation, response cache (cacheable GETs),
    /// circuit breaker, admission budget. When the budget is exhausted the
    /// call waits in a FIFO queue; cache and breaker are checked again when
    /// its turn comes.
    pub async fn execute(&self, options: RequestOptions) -> Result<HttpResponse> {
        let inner = &self.inner;
        if inner.is_disposed() {
            return Err(Error::Shutdown);
        }
        let request = inner.prepare(options)?;

        if let Some(resp) = inner.cached(&request).await {
            return Ok(resp);
        }
        inner.check_breaker(&request).await?;

        if request.skip_queue {
            inner.admission.force_acquire();
            let slot = AdmissionSlot::new(inner);
            return inner.run_admitted(slot, request).await;
        }

        let endpoint = request.endpoint.to_string();
        let (tx, rx) = oneshot::channel();
        let queued = QueuedRequest {
            request,
            responder: tx,
        };
        match inner.admission.acquire_or_enqueue(queued) {
            Err(_) => Err(Error::Shutdown),
            Ok(Some(admitted)) => {
                let slot = AdmissionSlot::new(inner);
                inner.run_admitted(slot, admitted.request).await
            }
            Ok(None) => {
                let _ = inner
                    .events
                    .report(ClientEvent::Queued {
                        endpoint,
                        queue_depth: inner.admission.queued(),
                    })
                    .await;
                rx.await.unwrap_or(Err(Error::Shutdown))
            }
        }
    }

    pub async fn get(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.execute(RequestOptions::get(path)).await
    }

    /// GET served from / stored in the response cache.
    pub async fn get_cached(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.execute(RequestOptions::get(path).use_cache(true)).await
    }

    pub async fn post(
        &self,
        path: impl Into<String>,
        body: serde_json::Value,
    ) -> Result<HttpResponse> {
        self.execute(RequestOptions::post(path, body)).await
    }

    pub async fn put(&self, path: impl Into<String>, body: serde_json::Value) -> Result<HttpResponse> {
        self.execute(RequestOptions::put(path, body)).await
    }

    pub async fn delete(&self, path: impl Into<String>) -> Result<HttpResponse> {
        self.execute(RequestOptions::delete(path)).await
    }

    /// Identity the client uses for `method` + `path` under the current config.
    pub fn endpoint_for(&self, method: &str, path: &str) -> Result<EndpointIdentity> {
        let method = HttpMethod::parse(method)?;
        let url = compose_url(
            &self.inner.config.base_url,
            &self.inner.config.path_prefix,
            path,
        );
        Ok(EndpointIdentity::new(method, &url))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Snapshot current runtime signals for diagnostics.
    pub fn signals(&self) -> SignalsSnapshot {
        let inner = &self.inner;
        SignalsSnapshot {
            admission: inner.admission.snapshot(),
            cache: CacheSignals {
                entries: inner.cache.len(),
                max_entries: inner.cache.max_entries(),
                stats: inner.cache.stats(),
            },
            circuit_breakers: inner.breakers.snapshots(),
            endpoints: inner.metrics.all(),
            disposed: inner.is_disposed(),
        }
    }

    pub fn metrics_for(&self, endpoint: &EndpointIdentity) -> Option<EndpointMetricsSnapshot> {
        self.inner.metrics.snapshot(endpoint)
    }

    pub fn breaker_state(&self, endpoint: &EndpointIdentity) -> CircuitState {
        self.inner.breakers.state(endpoint)
    }

    pub fn reset_circuit_breaker(&self, endpoint: &EndpointIdentity) -> bool {
        self.inner.breakers.reset(endpoint)
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Tear the client down. Idempotent.
    ///
    /// Queued requests resolve with `Error::Shutdown`; requests already on the
    /// wire finish normally. Later calls to [`execute`](Self::execute) fail
    /// with `Error::Shutdown`.
    pub async fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.shutdown.cancel();

        let pending = inner.admission.close();
        let rejected = pending.len();
        for item in pending {
            let _ = item.responder.send(Err(Error::Shutdown));
        }

        inner.cache.clear();
        inner.metrics.clear();
        inner.breakers.clear();
        inner.transport.close().await;
        let _ = inner.events.close().await;
        info!(rejected_queued = rejected, "network client disposed");
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl ClientInner {
    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn prepare(&self, options: RequestOptions) -> Result<PreparedRequest> {
        let method = HttpMethod::parse(&options.method)?;
        let url = compose_url(&self.config.base_url, &self.config.path_prefix, &options.path);
        let endpoint = EndpointIdentity::new(method, &url);
        let cache_key = (options.use_cache && method == HttpMethod::Get)
            .then(|| CacheKey::derive(method, &url, options.body.as_ref()));
        Ok(PreparedRequest {
            method,
            url,
            endpoint,
            body: options.body,
            headers: options.headers,
            requires_auth: options.requires_auth,
            skip_queue: options.skip_queue,
            cache_key,
            timeout: options.timeout.unwrap_or_else(|| self.config.default_timeout()),
        })
    }

    async fn cached(&self, request: &PreparedRequest) -> Option<HttpResponse> {
        let key = request.cache_key.as_ref()?;
        let resp = self.cache.lookup(key)?;
        let _ = self
            .events
            .report(ClientEvent::CacheHit {
                endpoint: request.endpoint.to_string(),
            })
            .await;
        Some(resp)
    }

    async fn check_breaker(&self, request: &PreparedRequest) -> Result<()> {
        if let Err(err) = self.breakers.check(&request.endpoint) {
            if let Error::CircuitOpen { retry_after_ms, .. } = &err {
                let _ = self
                    .events
                    .report(ClientEvent::CircuitRejected {
                        endpoint: request.endpoint.to_string(),
                        retry_after_ms: *retry_after_ms,
                    })
                    .await;
            }
            return Err(err);
        }
        Ok(())
    }

    /// `<unix millis>-<9 hex chars>`; logged, never part of a cache key.
    fn correlation_id(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.clock.unix_millis(), &suffix[..9])
    }

    /// Run a request that already owns an admission slot. The slot is handed
    /// on to the queue when `slot` drops, which also happens if the caller
    /// abandons this future mid-flight.
    async fn run_admitted(
        &self,
        slot: AdmissionSlot,
        request: PreparedRequest,
    ) -> Result<HttpResponse> {
        let result = self.perform(&request).await;
        drop(slot);
        result
    }

    /// Release a slot and start every queued request the freed capacity admits.
    fn finish_slot(self: &Arc<Self>) {
        for item in self.admission.release_and_drain() {
            self.spawn_queued(item);
        }
    }

    fn spawn_queued(self: &Arc<Self>, item: QueuedRequest) {
        let QueuedRequest { request, responder } = item;
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                // No runtime left to run it on.
                self.admission.release();
                let _ = responder.send(Err(Error::Shutdown));
                return;
            }
        };
        let slot = AdmissionSlot::new(self);
        let inner = Arc::clone(self);
        handle.spawn(async move {
            let result = inner.run_dequeued(slot, request).await;
            if responder.send(result).is_err() {
                debug!("queued request finished after its caller went away");
            }
        });
    }

    // Boxed to break the type cycle run_dequeued -> AdmissionSlot::drop -> spawn_queued.
    fn run_dequeued(
        self: Arc<Self>,
        slot: AdmissionSlot,
        request: PreparedRequest,
    ) -> BoxFuture<'static, Result<HttpResponse>> {
        async move {
            // Early exits drop `slot`, passing it straight to the next waiter.
            if let Some(resp) = self.cached(&request).await {
                return Ok(resp);
            }
            self.check_breaker(&request).await?;
            self.run_admitted(slot, request).await
        }
        .boxed()
    }

    async fn build_transport_request(
        &self,
        request: &PreparedRequest,
        request_id: &str,
    ) -> Result<(TransportRequest, Option<String>)> {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("accept".to_string(), "application/json".to_string());

        let mut masked = None;
        if request.requires_auth {
            match self.credentials.token().await {
                Ok(Some(token)) => {
                    masked = Some(mask_token(&token));
                    headers.insert("authorization".to_string(), format!("Bearer {}", token));
                }
                Ok(None) => {}
                Err(e) => warn!(
                    endpoint = %request.endpoint,
                    error = %e,
                    "credential lookup failed; sending unauthenticated"
                ),
            }
        }

        for (name, value) in &request.headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }
        headers.insert("x-request-id".to_string(), request_id.to_string());

        let body = match (&request.body, request.method.allows_body()) {
            (Some(body), true) => Some(Bytes::from(serde_json::to_vec(body)?)),
            _ => None,
        };

        Ok((
            TransportRequest {
                method: request.method,
                url: request.url.clone(),
                headers,
                body,
            },
            masked,
        ))
    }

    /// One network attempt plus breaker, metrics, cache and credential updates.
    async fn perform(&self, request: &PreparedRequest) -> Result<HttpResponse> {
        let request_id = self.correlation_id();
        let endpoint = request.endpoint.to_string();
        let (transport_request, credential) =
            self.build_transport_request(request, &request_id).await?;

        let _ = self
            .events
            .report(ClientEvent::RequestStarted {
                request_id: request_id.clone(),
                endpoint: endpoint.clone(),
                credential,
            })
            .await;

        let start = Instant::now();
        let outcome = tokio::time::timeout(request.timeout, self.transport.send(transport_request)).await;
        let elapsed = start.elapsed();

        let result = match outcome {
            Err(_) => Err(Error::Timeout {
                endpoint: endpoint.clone(),
                timeout_ms: request.timeout.as_millis() as u64,
            }),
            Ok(Err(source)) => Err(Error::Transport {
                endpoint: endpoint.clone(),
                source,
            }),
            Ok(Ok(resp)) if resp.is_success() => Ok(resp),
            Ok(Ok(resp)) => Err(Error::HttpStatus {
                status: resp.status,
                endpoint: endpoint.clone(),
                body: resp.text(),
            }),
        };

        let elapsed_ms = elapsed.as_millis() as u64;
        match &result {
            Ok(resp) => {
                self.breakers.record_success(&request.endpoint);
                self.metrics.record(&request.endpoint, true, elapsed);
                if let Some(key) = &request.cache_key {
                    if resp.status == 200 {
                        self.cache.store(key.clone(), resp.clone());
                    }
                }
                let _ = self
                    .events
                    .report(ClientEvent::ResponseReceived {
                        request_id,
                        endpoint,
                        status: resp.status,
                        elapsed_ms,
                    })
                    .await;
            }
            Err(err) => {
                if err.counts_against_breaker() {
                    self.breakers.record_failure(&request.endpoint);
                }
                self.metrics.record(&request.endpoint, false, elapsed);
                if err.is_auth_failure() {
                    if let Err(e) = self.credentials.clear_token().await {
                        warn!(error = %e, "failed to invalidate credential after auth failure");
                    } else {
                        info!(endpoint = endpoint.as_str(), "credential invalidated after auth failure");
                    }
                }
                let _ = self
                    .events
                    .report(ClientEvent::RequestFailed {
                        request_id,
                        endpoint,
                        error: err.to_string(),
                        category: err.category().to_string(),
                        elapsed_ms,
                    })
                    .await;
            }
        }
        result
    }

    /// One sweep tick: cache TTL/capacity eviction and metrics retention.
    pub(crate) fn run_maintenance(&self) -> crate::client::maintenance::MaintenanceReport {
        let cache = self.cache.sweep();
        let metrics_removed = self.metrics.sweep(self.config.metrics_retention());
        crate::client::maintenance::MaintenanceReport {
            cache,
            metrics_removed,
        }
    }
}
