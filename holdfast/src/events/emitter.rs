//! Event emission layer.
//!
//! The [`EventEmitter`] is a fire-and-forget handle over a broadcast
//! channel:
//!
//! - **Cheap to clone**: backed by a channel sender
//! - **Never blocks**: events are dropped when nobody is subscribed
//! - **Lossy for slow readers**: a lagging subscriber skips ahead

use super::event::{EvictionReason, Event, RequestMetrics};
use crate::connectivity::ConnectivityInfo;
use crate::queue::QueueId;
use crate::request::Signature;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Handle for publishing [`Event`]s.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: broadcast::Sender<Event>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Registers a new subscriber. It sees events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publishes an event (fire-and-forget).
    #[inline]
    pub fn emit(&self, event: Event) {
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    // =========================================================================
    // Cache
    // =========================================================================

    #[inline]
    pub fn cache_hit(&self, key: &Signature) {
        self.emit(Event::CacheHit { key: key.clone() });
    }

    #[inline]
    pub fn cache_miss(&self, key: &Signature) {
        self.emit(Event::CacheMiss { key: key.clone() });
    }

    #[inline]
    pub fn cache_evicted(&self, key: &Signature, reason: EvictionReason) {
        self.emit(Event::CacheEvicted {
            key: key.clone(),
            reason,
        });
    }

    #[inline]
    pub fn cache_write_failed(&self, key: &Signature, error: impl ToString) {
        self.emit(Event::CacheWriteFailed {
            key: key.clone(),
            error: error.to_string(),
        });
    }

    // =========================================================================
    // Queue
    // =========================================================================

    #[inline]
    pub fn queue_item_added(&self, id: QueueId, len: usize) {
        self.emit(Event::QueueItemAdded { id, len });
    }

    #[inline]
    pub fn queue_item_removed(&self, id: QueueId) {
        self.emit(Event::QueueItemRemoved { id });
    }

    #[inline]
    pub fn queue_item_retried(&self, id: QueueId, retry_count: u32) {
        self.emit(Event::QueueItemRetried { id, retry_count });
    }

    #[inline]
    pub fn queue_item_failed(&self, id: QueueId, error: impl ToString) {
        self.emit(Event::QueueItemFailed {
            id,
            error: error.to_string(),
        });
    }

    #[inline]
    pub fn queue_item_evicted(&self, id: QueueId) {
        self.emit(Event::QueueItemEvicted { id });
    }

    #[inline]
    pub fn queue_items_expired(&self, count: usize) {
        self.emit(Event::QueueItemsExpired { count });
    }

    #[inline]
    pub fn queue_persist_failed(&self, error: impl ToString) {
        self.emit(Event::QueuePersistFailed {
            error: error.to_string(),
        });
    }

    #[inline]
    pub fn replay_completed(&self, succeeded: usize, failed: usize, dropped: usize, remaining: usize) {
        self.emit(Event::ReplayCompleted {
            succeeded,
            failed,
            dropped,
            remaining,
        });
    }

    // =========================================================================
    // Connectivity and requests
    // =========================================================================

    #[inline]
    pub fn connectivity_changed(&self, info: ConnectivityInfo) {
        self.emit(Event::ConnectivityChanged(info));
    }

    #[inline]
    pub fn request_completed(&self, metrics: RequestMetrics) {
        self.emit(Event::RequestCompleted(metrics));
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
