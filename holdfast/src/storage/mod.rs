//! Key/value persistence.
//!
//! The persistent cache and the request queue store their state through a
//! [`KeyValueStore`]. Two backends are provided: [`MemoryStorage`], which
//! is lost on restart, and [`FileStorage`], which keeps one file per key in
//! a directory.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use futures::future::BoxFuture;
use thiserror::Error;

/// Errors from storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("task join error: {0}")]
    Join(String),
}

/// Minimal async key/value persistence contract.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the stored value, or `None` when the key is absent.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StorageError>>;

    /// Stores a value, replacing any previous one.
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Removes a key. Returns true if it existed.
    fn remove(&self, key: &str) -> BoxFuture<'_, Result<bool, StorageError>>;

    /// Removes every key.
    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Lists all keys, in no particular order.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StorageError>>;
}
