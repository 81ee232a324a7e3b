//! Periodic removal of expired queued requests.

use super::queue::RequestQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Background task that calls [`RequestQueue::sweep_expired`] on an interval.
pub struct QueueSweeper {
    queue: Arc<RequestQueue>,
    interval: Duration,
}

impl QueueSweeper {
    pub fn new(queue: Arc<RequestQueue>, interval: Duration) -> Self {
        Self { queue, interval }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Queue sweeper started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Queue sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(self.interval) => {
                        self.queue.sweep_expired().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::QueueConfig;
    use crate::request::{Method, Request};
    use crate::time::ManualClock;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_expires_old_items() {
        let clock = ManualClock::new();
        let queue = Arc::new(
            RequestQueue::new(QueueConfig {
                max_age: Duration::from_secs(30),
                ..QueueConfig::default()
            })
            .with_clock(Arc::new(clock.clone())),
        );
        queue
            .enqueue(Request::builder(Method::Delete, "/a").build())
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let handle = QueueSweeper::new(queue.clone(), Duration::from_secs(5)).spawn(shutdown.clone());

        clock.advance(Duration::from_secs(31));
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(queue.is_empty().await);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
