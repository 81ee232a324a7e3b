//! Holdfast service facade implementation.

use super::error::ServiceError;
use crate::config::ConfigFile;
use crate::connectivity::ConnectivityInfo;
use crate::orchestrator::{Orchestrator, ReplaySummary, RequestOptions, StatsSnapshot};
use crate::outcome::Outcome;
use crate::request::Request;
use crate::transport::ResponseDecoder;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// High-level facade owning an orchestrator and its background tasks.
///
/// Built by [`ServiceBuilder`](super::ServiceBuilder). Dropping the service
/// without calling [`shutdown`](Self::shutdown) leaves background tasks
/// running until the runtime stops.
///
/// # Example
///
/// ```ignore
/// use holdfast::config::ConfigFile;
/// use holdfast::request::Request;
/// use holdfast::service::ServiceBuilder;
/// use holdfast::transport::TextDecoder;
///
/// let service = ServiceBuilder::new(ConfigFile::load()?).build().await?;
/// let outcome = service.execute(Request::get("https://example.com"), &TextDecoder).await;
/// service.shutdown().await;
/// ```
pub struct HoldfastService {
    config: ConfigFile,
    orchestrator: Orchestrator,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl HoldfastService {
    pub(super) fn new(
        config: ConfigFile,
        orchestrator: Orchestrator,
        shutdown: CancellationToken,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            shutdown,
            tasks,
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// The orchestrator, for cancellation, events and direct access.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub async fn execute<T, D>(&self, request: Request, decoder: &D) -> Outcome<T>
    where
        D: ResponseDecoder<T> + ?Sized,
    {
        self.orchestrator.execute(request, decoder).await
    }

    pub async fn execute_with<T, D>(
        &self,
        request: Request,
        decoder: &D,
        options: RequestOptions,
    ) -> Outcome<T>
    where
        D: ResponseDecoder<T> + ?Sized,
    {
        self.orchestrator.execute_with(request, decoder, options).await
    }

    pub async fn replay_queue(&self) -> Result<ReplaySummary, ServiceError> {
        Ok(self.orchestrator.replay_queue().await?)
    }

    /// Forces the client offline, or releases the override.
    pub async fn set_offline(&self, offline: bool) -> Result<(), ServiceError> {
        let monitor = self
            .orchestrator
            .monitor()
            .ok_or(ServiceError::NotConfigured("connectivity monitor"))?;
        monitor.set_manual_offline(offline).await;
        Ok(())
    }

    /// Latest connectivity snapshot, or `None` without a monitor.
    pub fn connectivity(&self) -> Option<ConnectivityInfo> {
        self.orchestrator.monitor().map(|m| m.current())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.orchestrator.stats()
    }

    /// Stops background tasks, cancels in-flight requests and closes the
    /// transport.
    pub async fn shutdown(self) {
        info!("Holdfast service shutting down");
        self.shutdown.cancel();

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.orchestrator.close().await;
        info!("Holdfast service stopped");
    }
}
