//! Draining the offline queue once connectivity returns.

use super::engine::Orchestrator;
use crate::connectivity::ConnectivityInfo;
use crate::outcome::FailureKind;
use crate::queue::{QueueError, RequestQueue};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counts from one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Items delivered and removed from the queue.
    pub succeeded: usize,
    /// Items whose replay failed this pass, dropped ones included.
    pub failed: usize,
    /// Items removed after reaching the replay attempt limit.
    pub dropped: usize,
    /// Items still queued after the pass.
    pub remaining: usize,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("no request queue is configured")]
    QueueDisabled,

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl Orchestrator {
    /// Replays queued requests in FIFO order through the network path.
    ///
    /// Only the retry policy applies; cache, dedup and the offline check do
    /// not. A network or timeout failure stops the pass since connectivity
    /// is gone again. The queue must be idle.
    pub async fn replay_queue(&self) -> Result<ReplaySummary, ReplayError> {
        let queue = Arc::clone(self.inner.queue.as_ref().ok_or(ReplayError::QueueDisabled)?);
        queue.begin_processing().await?;
        let processing = ProcessingGuard::new(Arc::clone(&queue));

        let max_attempts = queue.config().max_replay_attempts;
        let retry = self.inner.config.retry.clone();
        let mut summary = ReplaySummary::default();

        for item in queue.snapshot().await {
            if self.is_offline() {
                debug!("Offline again, stopping replay");
                break;
            }

            let request = item.request.with_new_correlation_id();
            let registration = self.inner.cancellations.register(&request);
            let result = self
                .send_with_retry(&request, &retry, registration.token())
                .await;
            drop(registration);

            let error = match result {
                Ok((response, _)) => {
                    debug!(
                        queue_id = %item.id,
                        correlation_id = %request.correlation_id(),
                        status = response.status,
                        "Replayed queued request"
                    );
                    queue.remove(item.id).await;
                    summary.succeeded += 1;
                    continue;
                }
                Err((error, _)) => error,
            };

            let kind = error.kind();
            if kind == FailureKind::Cancelled {
                debug!(queue_id = %item.id, "Replay cancelled");
                break;
            }

            summary.failed += 1;
            let attempts = queue
                .retry(item.id)
                .await
                .unwrap_or(item.retry_count.saturating_add(1));
            queue.mark_failed(item.id, &error).await;

            if attempts >= max_attempts {
                warn!(
                    queue_id = %item.id,
                    attempts = attempts,
                    error = %error,
                    "Dropping queued request after repeated replay failures"
                );
                queue.remove(item.id).await;
                summary.dropped += 1;
            }

            if matches!(kind, FailureKind::Network | FailureKind::Timeout) {
                debug!(queue_id = %item.id, error = %error, "Connectivity lost during replay");
                break;
            }
        }

        processing.finish().await;

        summary.remaining = queue.len().await;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            dropped = summary.dropped,
            remaining = summary.remaining,
            "Queue replay finished"
        );
        self.inner.events.replay_completed(
            summary.succeeded,
            summary.failed,
            summary.dropped,
            summary.remaining,
        );

        Ok(summary)
    }
}

/// Returns the queue to idle when a replay ends, including when the replay
/// future is dropped part way through.
struct ProcessingGuard {
    queue: Arc<RequestQueue>,
    finished: bool,
}

impl ProcessingGuard {
    fn new(queue: Arc<RequestQueue>) -> Self {
        Self {
            queue,
            finished: false,
        }
    }

    async fn finish(mut self) {
        if let Err(error) = self.queue.finish_processing().await {
            warn!(error = %error, "Queue left processing state unexpectedly");
        }
        self.finished = true;
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Replay dropped before finishing, releasing queue");
            self.queue.abort_processing();
        }
    }
}

/// Replays the queue whenever connectivity goes from offline to online.
pub fn spawn_auto_replay(
    orchestrator: Orchestrator,
    mut connectivity: watch::Receiver<ConnectivityInfo>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut was_offline = connectivity.borrow_and_update().is_offline();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Auto replay shutting down");
                    break;
                }

                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let offline = connectivity.borrow_and_update().is_offline();
                    if was_offline && !offline {
                        info!("Connectivity restored, replaying queued requests");
                        if let Err(error) = orchestrator.replay_queue().await {
                            warn!(error = %error, "Auto replay failed");
                        }
                    }
                    was_offline = offline;
                }
            }
        }
    })
}
