//! Queue value types.

use crate::request::{Method, Request};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Methods queued while offline by default.
pub const DEFAULT_QUEUEABLE_METHODS: [Method; 4] =
    [Method::Post, Method::Put, Method::Patch, Method::Delete];

/// Default storage key for the persisted snapshot.
pub const DEFAULT_QUEUE_STORAGE_KEY: &str = "queue:pending";

/// Identifier of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(Uuid);

impl QueueId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: QueueId,
    pub request: Request,
    pub enqueued_at: DateTime<Utc>,
    /// Replay attempts so far.
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueuedRequest {
    pub fn new(request: Request, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: QueueId::new(),
            request,
            enqueued_at,
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }
}

/// Processing state of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    #[default]
    Idle,
    /// A replay is draining the queue.
    Processing,
    /// Replay is suspended.
    Paused,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueueState::Idle => "idle",
            QueueState::Processing => "processing",
            QueueState::Paused => "paused",
        })
    }
}

/// Errors from queue state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("invalid queue transition from {from} to {to}")]
    InvalidTransition { from: QueueState, to: QueueState },
}

/// Queue limits and behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Methods that may be queued; others are rejected by `enqueue`.
    pub queueable_methods: HashSet<Method>,
    /// Capacity. Enqueueing at capacity evicts the oldest item.
    pub max_size: usize,
    /// Items older than this are removed by `sweep_expired`.
    pub max_age: Duration,
    /// Replay attempts before an item is dropped.
    pub max_replay_attempts: u32,
    /// Key under which the snapshot is persisted.
    pub storage_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queueable_methods: DEFAULT_QUEUEABLE_METHODS.into_iter().collect(),
            max_size: 100,
            max_age: Duration::from_secs(24 * 60 * 60),
            max_replay_attempts: 5,
            storage_key: DEFAULT_QUEUE_STORAGE_KEY.to_string(),
        }
    }
}

impl QueueConfig {
    pub fn is_queueable(&self, method: Method) -> bool {
        self.queueable_methods.contains(&method)
    }
}
