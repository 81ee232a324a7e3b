//! Response caching.
//!
//! [`CachePolicy`] decides whether a request may read or populate the
//! cache; a [`CacheStore`] holds the entries. Three stores are provided:
//!
//! - [`MemoryCacheStore`]: bounded, in memory
//! - [`PersistentCacheStore`]: JSON entries in any [`KeyValueStore`](crate::storage::KeyValueStore)
//! - [`NoOpCacheStore`]: always empty
//!
//! Expired entries are treated as absent and removed lazily on lookup, or
//! in bulk by a [`CacheSweeper`].

mod entry;
mod memory;
mod persistent;
mod policy;
mod store;
mod sweeper;

pub use entry::CacheEntry;
pub use memory::{MemoryCacheStore, DEFAULT_MEMORY_CACHE_CAPACITY};
pub use persistent::{PersistentCacheStore, DEFAULT_PERSISTENT_CACHE_CAPACITY};
pub use policy::{CachePolicy, CacheStrategy, DEFAULT_CACHEABLE_METHODS, DEFAULT_CACHEABLE_STATUSES};
pub use store::{CacheStore, CacheStoreError, NoOpCacheStore};
pub use sweeper::CacheSweeper;
