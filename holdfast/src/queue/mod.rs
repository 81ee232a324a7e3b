//! Offline request queue.
//!
//! Mutating requests issued while offline are stored in a [`RequestQueue`]
//! and replayed once connectivity returns. The queue is bounded (oldest
//! evicted first), age limited, and persisted through a
//! [`KeyValueStore`](crate::storage::KeyValueStore) so it survives restarts.
//!
//! # State machine
//!
//! ```text
//! Idle ──begin_processing──► Processing ──finish_processing──► Idle
//! Idle ──pause─────────────► Paused ──────resume─────────────► Idle
//! ```

#[allow(clippy::module_inception)]
mod queue;
mod sweeper;
mod types;

pub use queue::RequestQueue;
pub use sweeper::QueueSweeper;
pub use types::{
    QueueConfig, QueueError, QueueId, QueueState, QueuedRequest, DEFAULT_QUEUEABLE_METHODS,
    DEFAULT_QUEUE_STORAGE_KEY,
};
