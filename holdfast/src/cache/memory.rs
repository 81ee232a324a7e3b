//! Bounded in-memory cache store.

use super::entry::CacheEntry;
use super::store::{CacheStore, CacheStoreError};
use crate::events::{EventEmitter, EvictionReason};
use crate::request::Signature;
use crate::time::{system_clock, Clock};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Default number of entries kept in memory.
pub const DEFAULT_MEMORY_CACHE_CAPACITY: usize = 256;

#[derive(Default)]
struct Inner {
    entries: HashMap<Signature, CacheEntry>,
    /// Insertion order, oldest first.
    order: VecDeque<Signature>,
}

impl Inner {
    fn forget(&mut self, key: &Signature) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }
}

/// In-memory store that evicts the oldest-inserted entry once full.
///
/// Replacing an existing key counts as a fresh insertion.
pub struct MemoryCacheStore {
    inner: Mutex<Inner>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    events: Option<EventEmitter>,
}

impl MemoryCacheStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            clock: system_clock(),
            events: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notify_evicted(&self, keys: &[Signature], reason: EvictionReason) {
        if let Some(events) = &self.events {
            for key in keys {
                events.cache_evicted(key, reason);
            }
        }
    }

    fn get_sync(&self, key: &Signature) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired_at(now) => return Some(entry.clone()),
            Some(_) => {}
        }
        inner.forget(key);
        drop(inner);
        debug!(key = %key.short(), "Expired cache entry removed on lookup");
        self.notify_evicted(std::slice::from_ref(key), EvictionReason::Expired);
        None
    }

    fn set_sync(&self, key: Signature, entry: CacheEntry) {
        let evicted = {
            let mut inner = self.inner.lock();
            inner.forget(&key);
            inner.entries.insert(key.clone(), entry);
            inner.order.push_back(key);

            let mut evicted = Vec::new();
            while inner.entries.len() > self.capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                        evicted.push(oldest);
                    }
                    None => break,
                }
            }
            evicted
        };
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Memory cache over capacity, evicted oldest");
            self.notify_evicted(&evicted, EvictionReason::Capacity);
        }
    }

    fn cleanup_sync(&self) -> usize {
        let now = self.clock.now();
        let expired: Vec<Signature> = {
            let mut inner = self.inner.lock();
            let expired: Vec<Signature> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.is_expired_at(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in &expired {
                inner.forget(key);
            }
            expired
        };
        self.notify_evicted(&expired, EvictionReason::Expired);
        expired.len()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_CAPACITY)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get<'a>(
        &'a self,
        key: &'a Signature,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, CacheStoreError>> {
        let found = self.get_sync(key);
        Box::pin(async move { Ok(found) })
    }

    fn set(&self, key: Signature, entry: CacheEntry) -> BoxFuture<'_, Result<(), CacheStoreError>> {
        self.set_sync(key, entry);
        Box::pin(async { Ok(()) })
    }

    fn remove<'a>(&'a self, key: &'a Signature) -> BoxFuture<'a, Result<bool, CacheStoreError>> {
        let existed = self.inner.lock().forget(key).is_some();
        Box::pin(async move { Ok(existed) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheStoreError>> {
        {
            let mut inner = self.inner.lock();
            inner.entries.clear();
            inner.order.clear();
        }
        Box::pin(async { Ok(()) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<Signature>, CacheStoreError>> {
        let keys = self.inner.lock().order.iter().cloned().collect();
        Box::pin(async move { Ok(keys) })
    }

    fn cleanup(&self) -> BoxFuture<'_, Result<usize, CacheStoreError>> {
        let removed = self.cleanup_sync();
        Box::pin(async move { Ok(removed) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::request::Headers;
    use crate::time::ManualClock;
    use bytes::Bytes;
    use std::time::Duration;

    fn key(n: u32) -> Signature {
        Signature::from_hex(format!("{:064x}", n))
    }

    fn entry(clock: &ManualClock, body: &str, ttl: Option<Duration>) -> CacheEntry {
        CacheEntry::new(Bytes::from(body.to_string()), 200, Headers::new(), clock.now(), ttl)
    }

    #[tokio::test]
    async fn test_round_trip_before_expiry_and_absent_after() {
        let clock = ManualClock::new();
        let store = MemoryCacheStore::new(8).with_clock(Arc::new(clock.clone()));
        let stored = entry(&clock, "payload", Some(Duration::from_secs(60)));

        store.set(key(1), stored.clone()).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.get(&key(1)).await.unwrap(), Some(stored));

        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get(&key(1)).await.unwrap(), None);
        assert!(store.is_empty(), "expired entry should be removed on lookup");
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_inserted() {
        let clock = ManualClock::new();
        let events = EventEmitter::new(16);
        let mut rx = events.subscribe();
        let store = MemoryCacheStore::new(2)
            .with_clock(Arc::new(clock.clone()))
            .with_events(events);

        store.set(key(1), entry(&clock, "a", None)).await.unwrap();
        store.set(key(2), entry(&clock, "b", None)).await.unwrap();
        store.set(key(3), entry(&clock, "c", None)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert!(store.get(&key(1)).await.unwrap().is_none());
        assert_eq!(store.keys().await.unwrap(), vec![key(2), key(3)]);

        match rx.recv().await.unwrap() {
            Event::CacheEvicted { key: k, reason } => {
                assert_eq!(k, key(1));
                assert_eq!(reason, EvictionReason::Capacity);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replacing_key_refreshes_insertion_order() {
        let clock = ManualClock::new();
        let store = MemoryCacheStore::new(2).with_clock(Arc::new(clock.clone()));

        store.set(key(1), entry(&clock, "a", None)).await.unwrap();
        store.set(key(2), entry(&clock, "b", None)).await.unwrap();
        store.set(key(1), entry(&clock, "a2", None)).await.unwrap();
        store.set(key(3), entry(&clock, "c", None)).await.unwrap();

        assert!(store.get(&key(2)).await.unwrap().is_none());
        assert_eq!(
            store.get(&key(1)).await.unwrap().unwrap().payload,
            Bytes::from("a2")
        );
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let clock = ManualClock::new();
        let store = MemoryCacheStore::new(8).with_clock(Arc::new(clock.clone()));

        store
            .set(key(1), entry(&clock, "short", Some(Duration::from_secs(1))))
            .await
            .unwrap();
        store
            .set(key(2), entry(&clock, "long", Some(Duration::from_secs(100))))
            .await
            .unwrap();
        store.set(key(3), entry(&clock, "forever", None)).await.unwrap();

        clock.advance(Duration::from_secs(5));

        assert_eq!(store.cleanup().await.unwrap(), 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let clock = ManualClock::new();
        let store = MemoryCacheStore::new(8).with_clock(Arc::new(clock.clone()));
        store.set(key(1), entry(&clock, "a", None)).await.unwrap();
        store.set(key(2), entry(&clock, "b", None)).await.unwrap();

        assert!(store.remove(&key(1)).await.unwrap());
        assert!(!store.remove(&key(1)).await.unwrap());

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }
}
