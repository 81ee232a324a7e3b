//! The request execution pipeline.
//!
//! ```text
//! execute ─► default headers ─► register cancellation ─► dedup
//!                                                          │
//!       ┌──────────────────────────────────────────────────┘
//!       ▼
//!   offline? ──yes──► queue (queueable) / cache / Network failure
//!       │no
//!       ▼
//!   cache first? ──hit──► Success { from_cache }
//!       │miss
//!       ▼
//!   retry loop (timeout per attempt, cancellable delays)
//!       │
//!       ├─ success ─► spawn cache write
//!       └─ failure ─► NetworkFirst fallback to a fresh entry
//! ```

use super::cancellation::CancellationRegistry;
use super::coalesce::{Registration, RequestCoalescer};
use super::config::{Effective, OrchestratorConfig, RequestOptions};
use super::exchange::Exchange;
use super::stats::{OrchestratorStats, StatsSnapshot};
use crate::cache::{CacheEntry, CacheStore};
use crate::connectivity::ConnectivityMonitor;
use crate::events::{EventEmitter, RequestMetrics};
use crate::outcome::{Failure, FailureKind, Outcome, OutcomeMeta, Success};
use crate::queue::RequestQueue;
use crate::request::{CorrelationId, Request, Signature};
use crate::retry::RetryPolicy;
use crate::time::Clock;
use crate::transport::{
    ResponseDecoder, Transport, TransportError, TransportResponse,
};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// State shared by every clone of an [`Orchestrator`].
pub(crate) struct Shared {
    pub transport: Arc<dyn Transport>,
    pub cache: Arc<dyn CacheStore>,
    pub queue: Option<Arc<RequestQueue>>,
    pub monitor: Option<Arc<ConnectivityMonitor>>,
    pub events: EventEmitter,
    pub config: OrchestratorConfig,
    pub clock: Arc<dyn Clock>,
    pub coalescer: RequestCoalescer,
    pub cancellations: CancellationRegistry,
    pub stats: OrchestratorStats,
}

/// Executes requests through dedup, offline queueing, caching and retries.
///
/// Cheap to clone; clones share all state. Built with
/// [`OrchestratorBuilder`](super::OrchestratorBuilder).
///
/// Execution never fails with `Err`: every call resolves to an [`Outcome`].
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) inner: Arc<Shared>,
}

/// Result of the retry loop: the final response or error, plus retries used.
pub(crate) type Attempted = Result<(TransportResponse, u32), (TransportError, u32)>;

impl Orchestrator {
    /// Executes `request` with the configured defaults.
    pub async fn execute<T, D>(&self, request: Request, decoder: &D) -> Outcome<T>
    where
        D: ResponseDecoder<T> + ?Sized,
    {
        self.execute_with(request, decoder, RequestOptions::default())
            .await
    }

    /// Executes `request` with per-request overrides.
    pub async fn execute_with<T, D>(
        &self,
        request: Request,
        decoder: &D,
        options: RequestOptions,
    ) -> Outcome<T>
    where
        D: ResponseDecoder<T> + ?Sized,
    {
        let started = Instant::now();
        let effective = Effective::resolve(&self.inner.config, options);
        let request = request
            .with_default_headers(&self.inner.config.default_headers)
            .with_timeout_fallback(effective.timeout);

        self.inner.stats.record_request();
        debug!(
            correlation_id = %request.correlation_id(),
            signature = %request.signature().short(),
            method = %request.method(),
            uri = %request.uri(),
            "Executing request"
        );

        // Unregisters on every exit path, including the caller dropping us
        let registration = self.inner.cancellations.register(&request);
        let (exchange, deduplicated) = self
            .run_deduplicated(&request, &effective, registration.token())
            .await;
        drop(registration);

        self.finish(&request, &exchange, deduplicated, decoder, started)
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels every in-flight execution carrying `tag`.
    pub fn cancel_by_tag(&self, tag: &str) -> usize {
        self.inner.cancellations.cancel_by_tag(tag)
    }

    /// Cancels the execution with `id`. Returns false if it is not in flight.
    pub fn cancel_by_correlation_id(&self, id: CorrelationId) -> bool {
        self.inner.cancellations.cancel_by_correlation_id(id)
    }

    pub fn cancel_all(&self) -> usize {
        self.inner.cancellations.cancel_all()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &EventEmitter {
        &self.inner.events
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.inner.cache
    }

    pub fn queue(&self) -> Option<&Arc<RequestQueue>> {
        self.inner.queue.as_ref()
    }

    pub fn monitor(&self) -> Option<&Arc<ConnectivityMonitor>> {
        self.inner.monitor.as_ref()
    }

    /// True when a monitor is attached and reports disconnected.
    pub fn is_offline(&self) -> bool {
        self.inner
            .monitor
            .as_ref()
            .is_some_and(|monitor| monitor.is_offline())
    }

    /// Number of executions currently registered for cancellation.
    pub fn in_flight(&self) -> usize {
        self.inner.cancellations.active_count()
    }

    /// Cancels everything in flight and closes the transport.
    pub async fn close(&self) {
        let cancelled = self.cancel_all();
        if cancelled > 0 {
            debug!(cancelled = cancelled, "Cancelled in-flight requests on close");
        }
        self.inner.transport.close().await;
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    async fn run_deduplicated(
        &self,
        request: &Request,
        effective: &Effective,
        token: &CancellationToken,
    ) -> (Arc<Exchange>, bool) {
        if !effective.dedup {
            let exchange = self.run_pipeline(request, effective, token).await;
            return (Arc::new(exchange), false);
        }

        match self
            .inner
            .coalescer
            .register(request.signature(), effective.dedup_window)
        {
            Registration::Leader(guard) => {
                let exchange = Arc::new(self.run_pipeline(request, effective, token).await);
                guard.complete(Arc::clone(&exchange));
                (exchange, false)
            }
            Registration::Waiter(mut rx) => {
                let shared = tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return (Arc::new(Exchange::error(TransportError::Cancelled, 0)), false);
                    }
                    received = rx.recv() => received.ok(),
                };

                match shared {
                    Some(exchange) if !exchange.is_cancelled() => (exchange, true),
                    _ => {
                        // Leader was dropped or cancelled; that must not
                        // cancel this caller.
                        debug!(
                            correlation_id = %request.correlation_id(),
                            "Leader did not complete, executing independently"
                        );
                        let exchange = self.run_pipeline(request, effective, token).await;
                        (Arc::new(exchange), false)
                    }
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &Request,
        effective: &Effective,
        token: &CancellationToken,
    ) -> Exchange {
        if self.is_offline() {
            return self.run_offline(request, effective).await;
        }

        let method = request.method();
        let policy = &effective.cache;

        if policy.prefers_cache() && policy.should_use_cache(method) {
            if let Some(entry) = self.lookup_cache(request.signature()).await {
                return Exchange::cached(response_from_entry(entry), 0);
            }
        }

        match self.send_with_retry(request, &effective.retry, token).await {
            Ok((response, retries)) => {
                if policy.should_cache(method, response.status) {
                    self.spawn_cache_write(request.signature().clone(), &response, policy.ttl());
                }
                Exchange::network(response, retries)
            }
            Err((error, retries)) => {
                let recoverable = matches!(error.kind(), FailureKind::Network | FailureKind::Timeout);
                if recoverable && policy.falls_back_to_cache() && policy.should_use_cache(method) {
                    if let Some(entry) = self.lookup_cache(request.signature()).await {
                        debug!(
                            correlation_id = %request.correlation_id(),
                            error = %error,
                            "Network failed, serving cached response"
                        );
                        return Exchange::cached(response_from_entry(entry), retries);
                    }
                }
                Exchange::error(error, retries)
            }
        }
    }

    async fn run_offline(&self, request: &Request, effective: &Effective) -> Exchange {
        let method = request.method();

        if let Some(queue) = &self.inner.queue {
            if queue.config().is_queueable(method) {
                if let Some(id) = queue.enqueue(request.clone()).await {
                    debug!(
                        correlation_id = %request.correlation_id(),
                        queue_id = %id,
                        "Offline, request queued for replay"
                    );
                    return Exchange::queued();
                }
            }
        }

        if effective.cache.should_use_cache(method) {
            if let Some(entry) = self.lookup_cache(request.signature()).await {
                debug!(correlation_id = %request.correlation_id(), "Offline, serving cached response");
                return Exchange::cached(response_from_entry(entry), 0);
            }
        }

        debug!(correlation_id = %request.correlation_id(), "Offline, failing without network call");
        Exchange::error(TransportError::Offline, 0)
    }

    /// Calls the transport until success, a non-retryable failure, or
    /// cancellation.
    pub(crate) async fn send_with_retry(
        &self,
        request: &Request,
        retry: &RetryPolicy,
        token: &CancellationToken,
    ) -> Attempted {
        let timeout = request.timeout().unwrap_or(self.inner.config.default_timeout);
        let mut attempt: u32 = 0;

        loop {
            if token.is_cancelled() {
                return Err((TransportError::Cancelled, attempt));
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(TransportError::Cancelled),
                sent = tokio::time::timeout(timeout, self.inner.transport.send(request)) => match sent {
                    Ok(Ok(response)) if response.is_success() => Ok(response),
                    Ok(Ok(response)) => Err(TransportError::from_response(response)),
                    Ok(Err(error)) => Err(error),
                    Err(_) => Err(TransportError::Timeout(timeout)),
                },
            };

            let error = match result {
                Ok(response) => return Ok((response, attempt)),
                Err(error) => error,
            };

            if !retry.should_retry(&error, attempt) {
                return Err((error, attempt));
            }

            let delay = retry.delay(attempt);
            debug!(
                correlation_id = %request.correlation_id(),
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request"
            );

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err((TransportError::Cancelled, attempt)),
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
            self.inner.stats.record_retry();
        }
    }

    async fn lookup_cache(&self, key: &Signature) -> Option<CacheEntry> {
        match self.inner.cache.get(key).await {
            Ok(Some(entry)) if !entry.is_expired_at(self.inner.clock.now()) => {
                self.inner.events.cache_hit(key);
                Some(entry)
            }
            Ok(_) => {
                self.inner.events.cache_miss(key);
                None
            }
            Err(error) => {
                warn!(signature = %key.short(), error = %error, "Cache read failed");
                None
            }
        }
    }

    fn spawn_cache_write(
        &self,
        key: Signature,
        response: &TransportResponse,
        ttl: Option<std::time::Duration>,
    ) {
        let entry = CacheEntry::new(
            response.body.clone(),
            response.status,
            response.headers.clone(),
            self.inner.clock.now(),
            ttl,
        );
        let cache = Arc::clone(&self.inner.cache);
        let events = self.inner.events.clone();

        tokio::spawn(async move {
            if let Err(error) = cache.set(key.clone(), entry).await {
                warn!(signature = %key.short(), error = %error, "Cache write failed");
                events.cache_write_failed(&key, &error);
            }
        });
    }

    // =========================================================================
    // Completion
    // =========================================================================

    fn finish<T, D>(
        &self,
        request: &Request,
        exchange: &Exchange,
        deduplicated: bool,
        decoder: &D,
        started: Instant,
    ) -> Outcome<T>
    where
        D: ResponseDecoder<T> + ?Sized,
    {
        let meta = OutcomeMeta {
            correlation_id: request.correlation_id(),
            completed_at: self.inner.clock.now(),
            elapsed: started.elapsed(),
        };

        let outcome = match exchange {
            Exchange::Response {
                response,
                from_cache,
                retry_count,
            } => match decoder.decode(response) {
                Ok(payload) => Outcome::Success(Success {
                    payload,
                    status: response.status,
                    headers: response.headers.clone(),
                    from_cache: *from_cache,
                    retry_count: *retry_count,
                    meta,
                }),
                Err(error) => Outcome::Failure(Failure {
                    kind: FailureKind::BadResponse,
                    status: Some(response.status),
                    cause: Some(Arc::new(error)),
                    retry_count: *retry_count,
                    meta,
                }),
            },
            Exchange::Failure {
                kind,
                status,
                cause,
                retry_count,
            } => Outcome::Failure(Failure {
                kind: *kind,
                status: *status,
                cause: cause.clone(),
                retry_count: *retry_count,
                meta,
            }),
        };

        self.record(request, &outcome, deduplicated);
        outcome
    }

    fn record<T>(&self, request: &Request, outcome: &Outcome<T>, deduplicated: bool) {
        let stats = &self.inner.stats;
        if deduplicated {
            stats.record_deduplicated();
        }

        let (status, failure, from_cache) = match outcome {
            Outcome::Success(success) => {
                stats.record_success();
                if success.from_cache {
                    stats.record_cache_hit();
                }
                (Some(success.status), None, success.from_cache)
            }
            Outcome::Failure(failure) => {
                match failure.kind {
                    FailureKind::Cancelled => stats.record_cancelled(),
                    FailureKind::QueuedForLater => stats.record_queued(),
                    _ => stats.record_failure(),
                }
                (failure.status, Some(failure.kind), false)
            }
        };

        let meta = outcome.meta();
        debug!(
            correlation_id = %meta.correlation_id,
            status = ?status,
            failure = ?failure,
            from_cache = from_cache,
            deduplicated = deduplicated,
            retries = outcome.retry_count(),
            elapsed_ms = meta.elapsed.as_millis() as u64,
            "Request completed"
        );

        self.inner.events.request_completed(RequestMetrics {
            correlation_id: meta.correlation_id,
            signature: request.signature().clone(),
            method: request.method(),
            uri: request.uri().to_string(),
            status,
            failure,
            from_cache,
            deduplicated,
            retry_count: outcome.retry_count(),
            elapsed: meta.elapsed,
        });
    }
}

fn response_from_entry(entry: CacheEntry) -> TransportResponse {
    TransportResponse {
        status: entry.status,
        headers: entry.headers,
        body: entry.payload,
    }
}
