//! Event types.
//!
//! Events describe things that already happened. They are produced by the
//! cache stores, the request queue, the connectivity monitor and the
//! orchestrator, and are consumed by observers that must never influence
//! request handling.

use crate::connectivity::ConnectivityInfo;
use crate::outcome::FailureKind;
use crate::queue::QueueId;
use crate::request::{CorrelationId, Method, Signature};
use std::time::Duration;

/// Why a cache entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// The store was over capacity.
    Capacity,
    /// The entry's TTL had elapsed.
    Expired,
}

/// Per-request measurements emitted when an execution completes.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub correlation_id: CorrelationId,
    pub signature: Signature,
    pub method: Method,
    pub uri: String,
    /// Response status, when one was received or served from cache.
    pub status: Option<u16>,
    /// Failure kind, or `None` for a success.
    pub failure: Option<FailureKind>,
    pub from_cache: bool,
    /// True when this caller shared another execution's result.
    pub deduplicated: bool,
    pub retry_count: u32,
    pub elapsed: Duration,
}

/// Observable occurrence.
#[derive(Debug, Clone)]
pub enum Event {
    // =========================================================================
    // Cache
    // =========================================================================
    CacheHit { key: Signature },
    CacheMiss { key: Signature },
    CacheEvicted { key: Signature, reason: EvictionReason },
    CacheWriteFailed { key: Signature, error: String },

    // =========================================================================
    // Queue
    // =========================================================================
    QueueItemAdded { id: QueueId, len: usize },
    QueueItemRemoved { id: QueueId },
    QueueItemRetried { id: QueueId, retry_count: u32 },
    QueueItemFailed { id: QueueId, error: String },
    /// Removed to make room for a newer item.
    QueueItemEvicted { id: QueueId },
    QueueItemsExpired { count: usize },
    QueuePersistFailed { error: String },
    ReplayCompleted {
        succeeded: usize,
        failed: usize,
        dropped: usize,
        remaining: usize,
    },

    // =========================================================================
    // Connectivity and requests
    // =========================================================================
    ConnectivityChanged(ConnectivityInfo),
    RequestCompleted(RequestMetrics),
}

impl Event {
    /// Short stable name, used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            Event::CacheHit { .. } => "cache_hit",
            Event::CacheMiss { .. } => "cache_miss",
            Event::CacheEvicted { .. } => "cache_evicted",
            Event::CacheWriteFailed { .. } => "cache_write_failed",
            Event::QueueItemAdded { .. } => "queue_item_added",
            Event::QueueItemRemoved { .. } => "queue_item_removed",
            Event::QueueItemRetried { .. } => "queue_item_retried",
            Event::QueueItemFailed { .. } => "queue_item_failed",
            Event::QueueItemEvicted { .. } => "queue_item_evicted",
            Event::QueueItemsExpired { .. } => "queue_items_expired",
            Event::QueuePersistFailed { .. } => "queue_persist_failed",
            Event::ReplayCompleted { .. } => "replay_completed",
            Event::ConnectivityChanged(_) => "connectivity_changed",
            Event::RequestCompleted(_) => "request_completed",
        }
    }
}
