//! Assembling an [`Orchestrator`] from its collaborators.

use super::cancellation::CancellationRegistry;
use super::coalesce::RequestCoalescer;
use super::config::OrchestratorConfig;
use super::engine::{Orchestrator, Shared};
use super::stats::OrchestratorStats;
use crate::cache::{CacheStore, MemoryCacheStore, DEFAULT_MEMORY_CACHE_CAPACITY};
use crate::connectivity::ConnectivityMonitor;
use crate::events::EventEmitter;
use crate::queue::RequestQueue;
use crate::time::{system_clock, Clock};
use crate::transport::Transport;
use std::sync::Arc;

/// Builder for [`Orchestrator`].
///
/// Only the transport is required. Without a cache store a bounded
/// [`MemoryCacheStore`] is used; without a queue offline mutations fail with
/// `Network`; without a monitor the orchestrator always considers itself
/// online.
///
/// ```
/// use holdfast::orchestrator::OrchestratorBuilder;
/// use holdfast::transport::mock::MockTransport;
/// use std::sync::Arc;
///
/// let orchestrator = OrchestratorBuilder::new(Arc::new(MockTransport::new())).build();
/// assert!(!orchestrator.is_offline());
/// ```
pub struct OrchestratorBuilder {
    transport: Arc<dyn Transport>,
    config: OrchestratorConfig,
    cache: Option<Arc<dyn CacheStore>>,
    queue: Option<Arc<RequestQueue>>,
    monitor: Option<Arc<ConnectivityMonitor>>,
    events: Option<EventEmitter>,
    clock: Option<Arc<dyn Clock>>,
}

impl OrchestratorBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: OrchestratorConfig::default(),
            cache: None,
            queue: None,
            monitor: None,
            events: None,
            clock: None,
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn queue(mut self, queue: Arc<RequestQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn monitor(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Emitter for request and cache events. Queue and monitor keep the
    /// emitter they were built with.
    pub fn events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Orchestrator {
        let events = self.events.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(system_clock);
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(
                MemoryCacheStore::new(DEFAULT_MEMORY_CACHE_CAPACITY)
                    .with_clock(Arc::clone(&clock))
                    .with_events(events.clone()),
            )
        });

        Orchestrator {
            inner: Arc::new(Shared {
                transport: self.transport,
                cache,
                queue: self.queue,
                monitor: self.monitor,
                events,
                config: self.config,
                clock,
                coalescer: RequestCoalescer::new(),
                cancellations: CancellationRegistry::new(),
                stats: OrchestratorStats::new(),
            }),
        }
    }
}
