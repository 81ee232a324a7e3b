//! Bounded, persisted FIFO of deferred requests.

use super::types::{QueueConfig, QueueError, QueueId, QueueState, QueuedRequest};
use crate::events::EventEmitter;
use crate::request::Request;
use crate::storage::KeyValueStore;
use crate::time::{is_older_than, system_clock, Clock};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Inner {
    items: VecDeque<QueuedRequest>,
    state: QueueState,
}

/// Offline request queue.
///
/// Every mutation persists the full snapshot while the queue lock is still
/// held, so concurrent enqueue, dequeue and persist never interleave. A
/// failed persist is logged and emitted; the in-memory change stands.
pub struct RequestQueue {
    inner: Mutex<Inner>,
    config: QueueConfig,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Arc<dyn Clock>,
    events: Option<EventEmitter>,
}

impl RequestQueue {
    /// Creates an empty, unpersisted queue.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            config,
            storage: None,
            clock: system_clock(),
            events: None,
        }
    }

    /// Persists every mutation to `storage`.
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    /// Loads the persisted snapshot, if any, into this queue.
    ///
    /// A missing snapshot leaves the queue empty. An unreadable or corrupt
    /// one is logged and ignored.
    pub async fn restore(self) -> Self {
        let Some(storage) = &self.storage else {
            return self;
        };
        let raw = match storage.get(&self.config.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return self,
            Err(e) => {
                warn!(error = %e, "Failed to read queue snapshot, starting empty");
                return self;
            }
        };
        match serde_json::from_slice::<VecDeque<QueuedRequest>>(&raw) {
            Ok(items) => {
                info!(count = items.len(), "Restored queued requests");
                self.inner.lock().await.items = items;
            }
            Err(e) => {
                warn!(error = %e, "Corrupt queue snapshot ignored");
            }
        }
        self
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Appends a request.
    ///
    /// Returns `None` without changing anything when the method is not
    /// queueable. At capacity the oldest item is evicted first.
    pub async fn enqueue(&self, request: Request) -> Option<QueueId> {
        if !self.config.is_queueable(request.method()) {
            debug!(method = %request.method(), "Method not queueable, ignoring");
            return None;
        }

        let item = QueuedRequest::new(request, self.clock.now());
        let id = item.id;

        let mut inner = self.inner.lock().await;
        let mut evicted = Vec::new();
        while inner.items.len() >= self.config.max_size.max(1) {
            match inner.items.pop_front() {
                Some(oldest) => evicted.push(oldest.id),
                None => break,
            }
        }
        inner.items.push_back(item);
        let len = inner.items.len();
        self.persist(&inner.items).await;
        drop(inner);

        if let Some(events) = &self.events {
            for old in evicted {
                events.queue_item_evicted(old);
            }
            events.queue_item_added(id, len);
        }
        debug!(id = %id, len = len, "Request enqueued");
        Some(id)
    }

    /// Removes and returns the oldest item.
    pub async fn dequeue(&self) -> Option<QueuedRequest> {
        let mut inner = self.inner.lock().await;
        let item = inner.items.pop_front()?;
        self.persist(&inner.items).await;
        drop(inner);

        self.notify(|e| e.queue_item_removed(item.id));
        Some(item)
    }

    /// Removes a specific item.
    pub async fn remove(&self, id: QueueId) -> Option<QueuedRequest> {
        let mut inner = self.inner.lock().await;
        let pos = inner.items.iter().position(|i| i.id == id)?;
        let item = inner.items.remove(pos)?;
        self.persist(&inner.items).await;
        drop(inner);

        self.notify(|e| e.queue_item_removed(id));
        Some(item)
    }

    /// Records a replay attempt. Returns the new retry count.
    pub async fn retry(&self, id: QueueId) -> Option<u32> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;
        let item = inner.items.iter_mut().find(|i| i.id == id)?;
        item.retry_count += 1;
        item.last_attempt_at = Some(now);
        let retry_count = item.retry_count;
        self.persist(&inner.items).await;
        drop(inner);

        self.notify(|e| e.queue_item_retried(id, retry_count));
        Some(retry_count)
    }

    /// Records the last error for an item. Returns false if it is gone.
    pub async fn mark_failed(&self, id: QueueId, error: impl ToString) -> bool {
        let error = error.to_string();
        let mut inner = self.inner.lock().await;
        let Some(item) = inner.items.iter_mut().find(|i| i.id == id) else {
            return false;
        };
        item.last_error = Some(error.clone());
        self.persist(&inner.items).await;
        drop(inner);

        self.notify(|e| e.queue_item_failed(id, error));
        true
    }

    /// Removes items older than the configured max age.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let max_age = self.config.max_age;
        let mut inner = self.inner.lock().await;
        let before = inner.items.len();
        inner
            .items
            .retain(|i| !is_older_than(i.enqueued_at, max_age, now));
        let removed = before - inner.items.len();
        if removed > 0 {
            self.persist(&inner.items).await;
        }
        drop(inner);

        if removed > 0 {
            info!(removed = removed, "Expired queued requests removed");
            self.notify(|e| e.queue_items_expired(removed));
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.items.is_empty()
    }

    /// Copy of every item, oldest first.
    pub async fn snapshot(&self) -> Vec<QueuedRequest> {
        self.inner.lock().await.items.iter().cloned().collect()
    }

    /// Copy of the oldest item.
    pub async fn peek(&self) -> Option<QueuedRequest> {
        self.inner.lock().await.items.front().cloned()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.items.clear();
        self.persist(&inner.items).await;
    }

    pub async fn state(&self) -> QueueState {
        self.inner.lock().await.state
    }

    pub async fn pause(&self) -> Result<(), QueueError> {
        self.transition(QueueState::Idle, QueueState::Paused).await
    }

    pub async fn resume(&self) -> Result<(), QueueError> {
        self.transition(QueueState::Paused, QueueState::Idle).await
    }

    pub async fn begin_processing(&self) -> Result<(), QueueError> {
        self.transition(QueueState::Idle, QueueState::Processing)
            .await
    }

    pub async fn finish_processing(&self) -> Result<(), QueueError> {
        self.transition(QueueState::Processing, QueueState::Idle)
            .await
    }

    /// Returns a processing queue to idle without awaiting.
    ///
    /// Falls back to a spawned transition when the lock is held elsewhere.
    /// Does nothing in any other state.
    pub(crate) fn abort_processing(self: &Arc<Self>) {
        match self.inner.try_lock() {
            Ok(mut inner) => {
                if inner.state == QueueState::Processing {
                    inner.state = QueueState::Idle;
                    debug!("Queue processing aborted");
                }
            }
            Err(_) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let queue = Arc::clone(self);
                    handle.spawn(async move {
                        let _ = queue.finish_processing().await;
                    });
                }
            }
        }
    }

        async fn transition(&self, from: QueueState, to: QueueState) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().await;
        if inner.state != from {
            return Err(QueueError::InvalidTransition {
                from: inner.state,
                to,
            });
        }
        inner.state = to;
        debug!(from = %from, to = %to, "Queue state changed");
        Ok(())
    }

    fn notify(&self, f: impl FnOnce(&EventEmitter)) {
        if let Some(events) = &self.events {
            f(events);
        }
    }

    async fn persist(&self, items: &VecDeque<QueuedRequest>) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = match serde_json::to_vec(items) {
            Ok(raw) => storage
                .set(&self.config.storage_key, raw)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(error) = result {
            warn!(error = %error, "Failed to persist request queue");
            self.notify(|e| e.queue_persist_failed(error));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::request::Method;
    use crate::storage::{MemoryStorage, StorageError};
    use crate::time::ManualClock;
    use futures::future::BoxFuture;
    use std::time::Duration;

    fn post(path: &str) -> Request {
        Request::builder(Method::Post, path).body("{}").build()
    }

    fn config(max_size: usize) -> QueueConfig {
        QueueConfig {
            max_size,
            max_age: Duration::from_secs(60),
            ..QueueConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = RequestQueue::new(config(10));
        queue.enqueue(post("/a")).await.unwrap();
        queue.enqueue(post("/b")).await.unwrap();

        assert_eq!(queue.dequeue().await.unwrap().request.uri(), "/a");
        assert_eq!(queue.dequeue().await.unwrap().request.uri(), "/b");
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_non_queueable_method_is_noop() {
        let queue = RequestQueue::new(config(10));

        assert!(queue.enqueue(Request::get("/a")).await.is_none());
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_evicts_exactly_the_oldest() {
        let events = EventEmitter::new(32);
        let mut rx = events.subscribe();
        let queue = RequestQueue::new(config(3)).with_events(events);

        let first = queue.enqueue(post("/1")).await.unwrap();
        queue.enqueue(post("/2")).await.unwrap();
        queue.enqueue(post("/3")).await.unwrap();
        let newest = queue.enqueue(post("/4")).await.unwrap();

        let items = queue.snapshot().await;
        let uris: Vec<_> = items.iter().map(|i| i.request.uri()).collect();
        assert_eq!(uris, vec!["/2", "/3", "/4"]);
        assert_eq!(items.last().unwrap().id, newest);

        let mut saw_eviction = false;
        while let Ok(event) = rx.try_recv() {
            if let Event::QueueItemEvicted { id } = event {
                assert_eq!(id, first);
                saw_eviction = true;
            }
        }
        assert!(saw_eviction);
    }

    #[tokio::test]
    async fn test_retry_and_mark_failed_stamp_item() {
        let clock = ManualClock::new();
        let queue = RequestQueue::new(config(10)).with_clock(Arc::new(clock.clone()));
        let id = queue.enqueue(post("/a")).await.unwrap();

        clock.advance(Duration::from_secs(3));
        assert_eq!(queue.retry(id).await, Some(1));
        assert_eq!(queue.retry(id).await, Some(2));
        assert!(queue.mark_failed(id, "503 from server").await);

        let item = queue.peek().await.unwrap();
        assert_eq!(item.retry_count, 2);
        assert_eq!(item.last_attempt_at, Some(clock.now()));
        assert_eq!(item.last_error.as_deref(), Some("503 from server"));

        assert!(queue.remove(id).await.is_some());
        assert_eq!(queue.retry(id).await, None);
        assert!(!queue.mark_failed(id, "gone").await);
    }

    #[tokio::test]
    async fn test_sweep_expired_uses_max_age() {
        let clock = ManualClock::new();
        let events = EventEmitter::new(32);
        let mut rx = events.subscribe();
        let queue = RequestQueue::new(config(10))
            .with_clock(Arc::new(clock.clone()))
            .with_events(events);

        queue.enqueue(post("/old")).await.unwrap();
        clock.advance(Duration::from_secs(45));
        queue.enqueue(post("/new")).await.unwrap();
        clock.advance(Duration::from_secs(20));

        assert_eq!(queue.sweep_expired().await, 1);
        assert_eq!(queue.peek().await.unwrap().request.uri(), "/new");

        let mut expired = None;
        while let Ok(event) = rx.try_recv() {
            if let Event::QueueItemsExpired { count } = event {
                expired = Some(count);
            }
        }
        assert_eq!(expired, Some(1));
    }

    #[tokio::test]
    async fn test_state_machine() {
        let queue = RequestQueue::new(config(10));
        assert_eq!(queue.state().await, QueueState::Idle);

        queue.begin_processing().await.unwrap();
        assert_eq!(
            queue.pause().await,
            Err(QueueError::InvalidTransition {
                from: QueueState::Processing,
                to: QueueState::Paused
            })
        );
        queue.finish_processing().await.unwrap();

        queue.pause().await.unwrap();
        assert!(queue.begin_processing().await.is_err());
        assert!(queue.finish_processing().await.is_err());
        queue.resume().await.unwrap();
        assert!(queue.resume().await.is_err());
        assert_eq!(queue.state().await, QueueState::Idle);
    }

    #[tokio::test]
    async fn test_abort_processing_only_leaves_processing() {
        let queue = Arc::new(RequestQueue::new(config(10)));

        queue.begin_processing().await.unwrap();
        queue.abort_processing();
        assert_eq!(queue.state().await, QueueState::Idle);

        queue.pause().await.unwrap();
        queue.abort_processing();
        assert_eq!(queue.state().await, QueueState::Paused);
    }

    #[tokio::test]
    async fn test_snapshot_persists_and_restores() {
        let storage = Arc::new(MemoryStorage::new());
        let queue = RequestQueue::new(config(10)).with_storage(storage.clone());
        queue.enqueue(post("/a")).await.unwrap();
        queue.enqueue(post("/b")).await.unwrap();
        queue.dequeue().await.unwrap();
        let expected = queue.snapshot().await;

        let restored = RequestQueue::new(config(10))
            .with_storage(storage)
            .restore()
            .await;

        assert_eq!(restored.snapshot().await, expected);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(crate::queue::DEFAULT_QUEUE_STORAGE_KEY, b"{{{".to_vec())
            .await
            .unwrap();

        let queue = RequestQueue::new(config(10))
            .with_storage(storage)
            .restore()
            .await;

        assert!(queue.is_empty().await);
    }

    struct FailingStorage;

    impl KeyValueStore for FailingStorage {
        fn get(&self, _key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StorageError>> {
            Box::pin(async { Ok(None) })
        }
        fn set(&self, _key: &str, _value: Vec<u8>) -> BoxFuture<'_, Result<(), StorageError>> {
            Box::pin(async { Err(StorageError::Io(std::io::Error::other("disk full"))) })
        }
        fn remove(&self, _key: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
            Box::pin(async { Ok(false) })
        }
        fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>> {
            Box::pin(async { Ok(()) })
        }
        fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_in_memory_change() {
        let events = EventEmitter::new(32);
        let mut rx = events.subscribe();
        let queue = RequestQueue::new(config(10))
            .with_storage(Arc::new(FailingStorage))
            .with_events(events);

        assert!(queue.enqueue(post("/a")).await.is_some());
        assert_eq!(queue.len().await, 1);

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, Event::QueuePersistFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }
}
