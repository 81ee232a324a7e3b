use super::{KeyValueStore, StorageError};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory storage. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StorageError>> {
        let value = self.entries.read().get(key).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StorageError>> {
        self.entries.write().insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>> {
        let existed = self.entries.write().remove(key).is_some();
        Box::pin(async move { Ok(existed) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        self.entries.write().clear();
        Box::pin(async { Ok(()) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        let keys = self.entries.read().keys().cloned().collect();
        Box::pin(async move { Ok(keys) })
    }
}
