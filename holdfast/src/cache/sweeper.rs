//! Periodic removal of expired cache entries.

use super::store::CacheStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Background task that calls [`CacheStore::cleanup`] on an interval.
pub struct CacheSweeper {
    store: Arc<dyn CacheStore>,
    interval: Duration,
}

impl CacheSweeper {
    pub fn new(store: Arc<dyn CacheStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Spawns the sweeper. It stops when `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Cache sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Cache sweeper shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    self.sweep_once().await;
                }
            }
        }
    }

    /// Runs a single sweep, returning the number of entries removed.
    pub async fn sweep_once(&self) -> usize {
        match self.store.cleanup().await {
            Ok(0) => 0,
            Ok(removed) => {
                debug!(removed = removed, "Cache sweep removed expired entries");
                removed
            }
            Err(e) => {
                warn!(error = %e, "Cache sweep failed");
                0
            }
        }
    }
}
