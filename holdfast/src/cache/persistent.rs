//! Cache store backed by a [`KeyValueStore`].
//!
//! Entries are serialized as JSON under `cache:{signature}`. Other keys in
//! the same storage are ignored, so the queue and the cache may share one
//! backend.

use super::entry::CacheEntry;
use super::store::{CacheStore, CacheStoreError};
use crate::events::{EventEmitter, EvictionReason};
use crate::request::Signature;
use crate::storage::KeyValueStore;
use crate::time::{system_clock, Clock};
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "cache:";

/// Default number of entries kept in persistent storage.
pub const DEFAULT_PERSISTENT_CACHE_CAPACITY: usize = 1024;

/// Persistent store bounded by entry count, evicting the oldest `created_at`.
pub struct PersistentCacheStore {
    storage: Arc<dyn KeyValueStore>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    events: Option<EventEmitter>,
    /// Serializes writers so the capacity check sees a stable key set.
    write_lock: Mutex<()>,
}

impl PersistentCacheStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            storage,
            capacity: capacity.max(1),
            clock: system_clock(),
            events: None,
            write_lock: Mutex::new(()),
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

    fn storage_key(key: &Signature) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    fn notify_evicted(&self, key: &Signature, reason: EvictionReason) {
        if let Some(events) = &self.events {
            events.cache_evicted(key, reason);
        }
    }

    /// Loads an entry, dropping it from storage if it cannot be parsed.
    async fn load(&self, key: &Signature) -> Result<Option<CacheEntry>, CacheStoreError> {
        let storage_key = Self::storage_key(key);
        let Some(raw) = self.storage.get(&storage_key).await? else {
            return Ok(None);
        };
        match serde_json::from_slice::<CacheEntry>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(key = %key.short(), error = %e, "Discarding corrupt cache entry");
                self.storage.remove(&storage_key).await?;
                Ok(None)
            }
        }
    }

    async fn signatures(&self) -> Result<Vec<Signature>, CacheStoreError> {
        Ok(self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(KEY_PREFIX).map(Signature::from_hex))
            .collect())
    }

    async fn evict_over_capacity(&self) -> Result<(), CacheStoreError> {
        let keys = self.signatures().await?;
        if keys.len() <= self.capacity {
            return Ok(());
        }

        let mut aged = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.load(&key).await? {
                aged.push((entry.created_at, key));
            }
        }
        aged.sort();

        let excess = aged.len().saturating_sub(self.capacity);
        for (_, key) in aged.into_iter().take(excess) {
            self.storage.remove(&Self::storage_key(&key)).await?;
            debug!(key = %key.short(), "Persistent cache over capacity, evicted oldest");
            self.notify_evicted(&key, EvictionReason::Capacity);
        }
        Ok(())
    }
}

impl CacheStore for PersistentCacheStore {
    fn get<'a>(
        &'a self,
        key: &'a Signature,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, CacheStoreError>> {
        Box::pin(async move {
            let Some(entry) = self.load(key).await? else {
                return Ok(None);
            };
            if entry.is_expired_at(self.clock.now()) {
                self.storage.remove(&Self::storage_key(key)).await?;
                self.notify_evicted(key, EvictionReason::Expired);
                return Ok(None);
            }
            Ok(Some(entry))
        })
    }

    fn set(&self, key: Signature, entry: CacheEntry) -> BoxFuture<'_, Result<(), CacheStoreError>> {
        Box::pin(async move {
            let raw = serde_json::to_vec(&entry)?;
            let _guard = self.write_lock.lock().await;
            self.storage.set(&Self::storage_key(&key), raw).await?;
            self.evict_over_capacity().await
        })
    }

    fn remove<'a>(&'a self, key: &'a Signature) -> BoxFuture<'a, Result<bool, CacheStoreError>> {
        Box::pin(async move { Ok(self.storage.remove(&Self::storage_key(key)).await?) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheStoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            for key in self.signatures().await? {
                self.storage.remove(&Self::storage_key(&key)).await?;
            }
            Ok(())
        })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<Signature>, CacheStoreError>> {
        Box::pin(self.signatures())
    }

    fn cleanup(&self) -> BoxFuture<'_, Result<usize, CacheStoreError>> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut removed = 0;
            for key in self.signatures().await? {
                if let Some(entry) = self.load(&key).await? {
                    if entry.is_expired_at(now) {
                        self.storage.remove(&Self::storage_key(&key)).await?;
                        self.notify_evicted(&key, EvictionReason::Expired);
                        removed += 1;
                    }
                }
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Headers;
    use crate::storage::{FileStorage, MemoryStorage};
    use crate::time::ManualClock;
    use bytes::Bytes;
    use std::time::Duration;
    use tempfile::TempDir;

    fn key(n: u32) -> Signature {
        Signature::from_hex(format!("{:064x}", n))
    }

    fn entry(clock: &ManualClock, ttl: Option<Duration>) -> CacheEntry {
        CacheEntry::new(Bytes::from("body"), 200, Headers::new(), clock.now(), ttl)
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let clock = ManualClock::new();
        let stored = entry(&clock, Some(Duration::from_secs(60)));
        {
            let storage = Arc::new(FileStorage::open(temp_dir.path()).await.unwrap());
            let store = PersistentCacheStore::new(storage, 10).with_clock(Arc::new(clock.clone()));
            store.set(key(1), stored.clone()).await.unwrap();
        }

        let storage = Arc::new(FileStorage::open(temp_dir.path()).await.unwrap());
        let store = PersistentCacheStore::new(storage, 10).with_clock(Arc::new(clock.clone()));

        assert_eq!(store.get(&key(1)).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_removed() {
        let clock = ManualClock::new();
        let storage = Arc::new(MemoryStorage::new());
        let store = PersistentCacheStore::new(storage.clone(), 10).with_clock(Arc::new(clock.clone()));

        store
            .set(key(1), entry(&clock, Some(Duration::from_secs(5))))
            .await
            .unwrap();
        clock.advance(Duration::from_secs(6));

        assert!(store.get(&key(1)).await.unwrap().is_none());
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_created() {
        let clock = ManualClock::new();
        let storage = Arc::new(MemoryStorage::new());
        let store = PersistentCacheStore::new(storage, 2).with_clock(Arc::new(clock.clone()));

        for n in 1..=3 {
            store.set(key(n), entry(&clock, None)).await.unwrap();
            clock.advance(Duration::from_secs(1));
        }

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec![key(2), key(3)]);
    }

    #[tokio::test]
    async fn test_ignores_foreign_keys_and_corrupt_entries() {
        let clock = ManualClock::new();
        let storage = Arc::new(MemoryStorage::new());
        storage.set("queue:pending", b"[]".to_vec()).await.unwrap();
        storage
            .set(&format!("cache:{}", key(9)), b"{not json".to_vec())
            .await
            .unwrap();
        let store = PersistentCacheStore::new(storage.clone(), 10).with_clock(Arc::new(clock));

        assert_eq!(store.keys().await.unwrap(), vec![key(9)]);
        assert!(store.get(&key(9)).await.unwrap().is_none());
        assert_eq!(storage.keys().await.unwrap(), vec!["queue:pending".to_string()]);
    }

    #[tokio::test]
    async fn test_cleanup_counts_expired() {
        let clock = ManualClock::new();
        let store = PersistentCacheStore::new(Arc::new(MemoryStorage::new()), 10)
            .with_clock(Arc::new(clock.clone()));

        store
            .set(key(1), entry(&clock, Some(Duration::from_secs(1))))
            .await
            .unwrap();
        store.set(key(2), entry(&clock, None)).await.unwrap();
        clock.advance(Duration::from_secs(2));

        assert_eq!(store.cleanup().await.unwrap(), 1);
        assert_eq!(store.keys().await.unwrap(), vec![key(2)]);
    }
}
