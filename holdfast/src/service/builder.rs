//! Service builder for constructing a [`HoldfastService`] from configuration.
//!
//! Each store is created by a small function so the wiring stays readable:
//!
//! ```text
//! ConfigFile ──► create_cache_store ──┐
//!            ──► create_queue ────────┼──► OrchestratorBuilder ──► Orchestrator
//!            ──► create_monitor ──────┘                               │
//!                                                                     ▼
//!                        background tasks (probe, sweeps, event log, auto replay)
//! ```

use super::error::ServiceError;
use super::facade::HoldfastService;
use crate::cache::{
    CacheStore, CacheSweeper, MemoryCacheStore, NoOpCacheStore, PersistentCacheStore,
};
use crate::config::{ConfigFile, ProbeKind, StorageKind};
use crate::connectivity::{ConnectivityMonitor, HttpProber, Prober, TcpProber};
use crate::events::{spawn_event_logger, EventEmitter};
use crate::orchestrator::{spawn_auto_replay, OrchestratorBuilder};
use crate::queue::{QueueSweeper, RequestQueue};
use crate::storage::{FileStorage, KeyValueStore, MemoryStorage};
use crate::time::{system_clock, Clock};
use crate::transport::{ReqwestTransport, Transport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builder for [`HoldfastService`].
///
/// Transport and prober default to [`ReqwestTransport`] and the probe type
/// named in the configuration; tests substitute mocks.
pub struct ServiceBuilder {
    config: ConfigFile,
    transport: Option<Arc<dyn Transport>>,
    prober: Option<Arc<dyn Prober>>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<EventEmitter>,
}

impl ServiceBuilder {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            config,
            transport: None,
            prober: None,
            clock: None,
            events: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    /// Opens the stores, restores the queue and starts background tasks.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn build(self) -> Result<HoldfastService, ServiceError> {
        let config = self.config;
        let events = self.events.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(system_clock);

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        let cache = create_cache_store(&config, &events, &clock).await?;
        let queue = create_queue(&config, &events, &clock).await?;
        let monitor = create_monitor(&config, self.prober, &events);

        let mut builder = OrchestratorBuilder::new(transport)
            .config(config.to_orchestrator_config())
            .cache_store(Arc::clone(&cache))
            .events(events.clone())
            .clock(clock);
        if let Some(queue) = &queue {
            builder = builder.queue(Arc::clone(queue));
        }
        if let Some(monitor) = &monitor {
            builder = builder.monitor(Arc::clone(monitor));
        }
        let orchestrator = builder.build();

        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();

        if config.logging.log_events {
            tasks.push(spawn_event_logger(&events, shutdown.child_token()));
        }
        if let Some(monitor) = &monitor {
            tasks.push(Arc::clone(monitor).start(shutdown.child_token()));
            if config.queue.auto_replay && queue.is_some() {
                tasks.push(spawn_auto_replay(
                    orchestrator.clone(),
                    monitor.subscribe(),
                    shutdown.child_token(),
                ));
            }
        }
        if config.cache.storage != StorageKind::Disabled {
            tasks.push(
                CacheSweeper::new(Arc::clone(&cache), config.cache.sweep_interval())
                    .spawn(shutdown.child_token()),
            );
        }
        if let Some(queue) = &queue {
            tasks.push(
                QueueSweeper::new(Arc::clone(queue), config.queue.sweep_interval())
                    .spawn(shutdown.child_token()),
            );
        }

        info!(
            cache = %config.cache.storage,
            queue = %config.queue.storage,
            connectivity = monitor.is_some(),
            auto_replay = config.queue.auto_replay,
            background_tasks = tasks.len(),
            "Holdfast service started"
        );

        Ok(HoldfastService::new(config, orchestrator, shutdown, tasks))
    }
}

/// Create the cache store named by `[cache] storage`.
pub async fn create_cache_store(
    config: &ConfigFile,
    events: &EventEmitter,
    clock: &Arc<dyn Clock>,
) -> Result<Arc<dyn CacheStore>, ServiceError> {
    let settings = &config.cache;
    let store: Arc<dyn CacheStore> = match settings.storage {
        StorageKind::Disabled => Arc::new(NoOpCacheStore),
        StorageKind::Memory => Arc::new(
            MemoryCacheStore::new(settings.capacity)
                .with_clock(Arc::clone(clock))
                .with_events(events.clone()),
        ),
        StorageKind::Persistent => {
            let storage: Arc<dyn KeyValueStore> =
                Arc::new(FileStorage::open(&settings.directory).await?);
            Arc::new(
                PersistentCacheStore::new(storage, settings.capacity)
                    .with_clock(Arc::clone(clock))
                    .with_events(events.clone()),
            )
        }
    };
    Ok(store)
}

/// Create and restore the offline queue named by `[queue] storage`.
///
/// Returns `None` when the queue is disabled.
pub async fn create_queue(
    config: &ConfigFile,
    events: &EventEmitter,
    clock: &Arc<dyn Clock>,
) -> Result<Option<Arc<RequestQueue>>, ServiceError> {
    let settings = &config.queue;
    let storage: Arc<dyn KeyValueStore> = match settings.storage {
        StorageKind::Disabled => return Ok(None),
        StorageKind::Memory => Arc::new(MemoryStorage::new()),
        StorageKind::Persistent => Arc::new(FileStorage::open(&settings.directory).await?),
    };

    let queue = RequestQueue::new(settings.to_queue_config())
        .with_storage(storage)
        .with_clock(Arc::clone(clock))
        .with_events(events.clone())
        .restore()
        .await;
    Ok(Some(Arc::new(queue)))
}

/// Create the connectivity monitor, or `None` when probing is disabled.
pub fn create_monitor(
    config: &ConfigFile,
    prober: Option<Arc<dyn Prober>>,
    events: &EventEmitter,
) -> Option<Arc<ConnectivityMonitor>> {
    let settings = &config.connectivity;
    if !settings.enabled {
        return None;
    }

    let prober: Arc<dyn Prober> = match (prober, settings.probe) {
        (Some(prober), _) => prober,
        (None, ProbeKind::Tcp) => Arc::new(TcpProber),
        (None, ProbeKind::Http) => Arc::new(HttpProber::new()),
    };

    Some(Arc::new(
        ConnectivityMonitor::new(settings.to_monitor_config(), prober).with_events(events.clone()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_disabled_queue_is_none() {
        let mut config = ConfigFile::default();
        config.queue.storage = StorageKind::Disabled;

        let queue = create_queue(&config, &EventEmitter::default(), &system_clock())
            .await
            .unwrap();

        assert!(queue.is_none());
    }

    #[tokio::test]
    async fn test_persistent_stores_create_directories() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = ConfigFile::default();
        config.cache.storage = StorageKind::Persistent;
        config.cache.directory = temp_dir.path().join("cache");
        config.queue.storage = StorageKind::Persistent;
        config.queue.directory = temp_dir.path().join("queue");

        let events = EventEmitter::default();
        let clock = system_clock();
        create_cache_store(&config, &events, &clock).await.unwrap();
        let queue = create_queue(&config, &events, &clock).await.unwrap();

        assert!(queue.is_some());
        assert!(config.cache.directory.is_dir());
        assert!(config.queue.directory.is_dir());
    }

    #[test]
    fn test_monitor_disabled() {
        let mut config = ConfigFile::default();
        config.connectivity.enabled = false;

        assert!(create_monitor(&config, None, &EventEmitter::default()).is_none());
    }
}
