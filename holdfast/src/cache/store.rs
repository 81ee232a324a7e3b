//! Cache store contract.

use super::entry::CacheEntry;
use crate::request::Signature;
use crate::storage::StorageError;
use futures::future::BoxFuture;
use thiserror::Error;

/// Errors from cache stores.
#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Pluggable signature-to-entry store with TTL expiry.
///
/// Implementations must treat expired entries as absent: `get` never
/// returns one, and removes it when found.
pub trait CacheStore: Send + Sync + 'static {
    fn get<'a>(
        &'a self,
        key: &'a Signature,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, CacheStoreError>>;

    /// Stores an entry, evicting the oldest if the store is bounded and full.
    fn set(&self, key: Signature, entry: CacheEntry) -> BoxFuture<'_, Result<(), CacheStoreError>>;

    /// Removes an entry. Returns true if it existed.
    fn remove<'a>(&'a self, key: &'a Signature) -> BoxFuture<'a, Result<bool, CacheStoreError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheStoreError>>;

    fn keys(&self) -> BoxFuture<'_, Result<Vec<Signature>, CacheStoreError>>;

    /// Removes every expired entry and returns how many were removed.
    fn cleanup(&self) -> BoxFuture<'_, Result<usize, CacheStoreError>>;
}

/// Store that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCacheStore;

impl CacheStore for NoOpCacheStore {
    fn get<'a>(
        &'a self,
        _key: &'a Signature,
    ) -> BoxFuture<'a, Result<Option<CacheEntry>, CacheStoreError>> {
        Box::pin(async { Ok(None) })
    }

    fn set(&self, _key: Signature, _entry: CacheEntry) -> BoxFuture<'_, Result<(), CacheStoreError>> {
        Box::pin(async { Ok(()) })
    }

    fn remove<'a>(&'a self, _key: &'a Signature) -> BoxFuture<'a, Result<bool, CacheStoreError>> {
        Box::pin(async { Ok(false) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), CacheStoreError>> {
        Box::pin(async { Ok(()) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<Signature>, CacheStoreError>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn cleanup(&self) -> BoxFuture<'_, Result<usize, CacheStoreError>> {
        Box::pin(async { Ok(0) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Headers;
    use bytes::Bytes;
    use chrono::Utc;

    #[tokio::test]
    async fn test_noop_store_is_always_empty() {
        let store = NoOpCacheStore;
        let key = Signature::from_hex("abc");

        store
            .set(
                key.clone(),
                CacheEntry::new(Bytes::from("x"), 200, Headers::new(), Utc::now(), None),
            )
            .await
            .unwrap();

        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.keys().await.unwrap().is_empty());
        assert_eq!(store.cleanup().await.unwrap(), 0);
    }
}
