//! Mirrors the event stream into `tracing`.

use super::emitter::EventEmitter;
use super::event::Event;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawns a task that logs every event until `shutdown` is cancelled.
pub fn spawn_event_logger(emitter: &EventEmitter, shutdown: CancellationToken) -> JoinHandle<()> {
    let mut rx = emitter.subscribe();
    tokio::spawn(async move {
        debug!("Event logger started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Event logger shutting down");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(event) => log_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Event logger lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

/// Writes a single event as a structured log line.
pub fn log_event(event: &Event) {
    let name = event.name();
    match event {
        Event::CacheHit { key } | Event::CacheMiss { key } => {
            debug!(event = name, key = %key.short());
        }
        Event::CacheEvicted { key, reason } => {
            debug!(event = name, key = %key.short(), reason = ?reason);
        }
        Event::CacheWriteFailed { key, error } => {
            warn!(event = name, key = %key.short(), error = %error, "Cache write failed");
        }
        Event::QueueItemAdded { id, len } => {
            info!(event = name, id = %id, len = len, "Request queued for later");
        }
        Event::QueueItemRemoved { id } => debug!(event = name, id = %id),
        Event::QueueItemRetried { id, retry_count } => {
            debug!(event = name, id = %id, retry_count = retry_count);
        }
        Event::QueueItemFailed { id, error } => {
            warn!(event = name, id = %id, error = %error, "Queued request failed");
        }
        Event::QueueItemEvicted { id } => {
            warn!(event = name, id = %id, "Queue full, oldest request evicted");
        }
        Event::QueueItemsExpired { count } => {
            info!(event = name, count = count, "Expired queued requests removed");
        }
        Event::QueuePersistFailed { error } => {
            warn!(event = name, error = %error, "Queue persistence failed");
        }
        Event::ReplayCompleted {
            succeeded,
            failed,
            dropped,
            remaining,
        } => {
            info!(
                event = name,
                succeeded = succeeded,
                failed = failed,
                dropped = dropped,
                remaining = remaining,
                "Queue replay finished"
            );
        }
        Event::ConnectivityChanged(info) => {
            info!(
                event = name,
                status = ?info.status,
                quality = ?info.quality,
                latency_ms = info.latency.map(|l| l.as_millis() as u64),
                "Connectivity changed"
            );
        }
        Event::RequestCompleted(m) => {
            debug!(
                event = name,
                correlation_id = %m.correlation_id,
                method = %m.method,
                uri = %m.uri,
                status = m.status,
                failure = m.failure.map(|k| k.as_str()),
                from_cache = m.from_cache,
                deduplicated = m.deduplicated,
                retry_count = m.retry_count,
                elapsed_ms = m.elapsed.as_millis() as u64,
                "Request completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_logger_stops_on_shutdown() {
        let emitter = EventEmitter::default();
        let shutdown = CancellationToken::new();
        let handle = spawn_event_logger(&emitter, shutdown.clone());

        emitter.queue_items_expired(1);
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("logger did not stop")
            .unwrap();
    }
}
