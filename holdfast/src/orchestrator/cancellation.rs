//! Cooperative cancellation of in-flight executions.

use crate::request::{CorrelationId, Request};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Registered {
    correlation_id: CorrelationId,
    token: CancellationToken,
    tags: BTreeSet<String>,
}

/// Active executions keyed by registration.
///
/// Clones of one request share a correlation id, so several entries may
/// carry the same id; each guard removes only its own.
#[derive(Default)]
pub(crate) struct CancellationRegistry {
    active: DashMap<u64, Registered>,
    next_key: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an execution. The returned guard unregisters on drop.
    pub fn register(&self, request: &Request) -> CancellationGuard<'_> {
        let token = CancellationToken::new();
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);
        self.active.insert(
            key,
            Registered {
                correlation_id: request.correlation_id(),
                token: token.clone(),
                tags: request.tags().clone(),
            },
        );
        CancellationGuard {
            registry: self,
            key,
            token,
        }
    }

    /// Cancels every execution carrying `id`. Returns false if none is
    /// registered.
    pub fn cancel_by_correlation_id(&self, id: CorrelationId) -> bool {
        let mut cancelled = 0;
        for entry in self.active.iter() {
            if entry.correlation_id == id {
                entry.token.cancel();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            debug!(correlation_id = %id, cancelled = cancelled, "Cancelled execution");
        }
        cancelled > 0
    }

    pub fn cancel_by_tag(&self, tag: &str) -> usize {
        let mut cancelled = 0;
        for entry in self.active.iter() {
            if entry.tags.contains(tag) {
                entry.token.cancel();
                cancelled += 1;
            }
        }
        debug!(tag = tag, cancelled = cancelled, "Cancelled executions by tag");
        cancelled
    }

    pub fn cancel_all(&self) -> usize {
        let mut cancelled = 0;
        for entry in self.active.iter() {
            entry.token.cancel();
            cancelled += 1;
        }
        cancelled
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

/// Keeps an execution registered for as long as it lives.
pub(crate) struct CancellationGuard<'a> {
    registry: &'a CancellationRegistry,
    key: u64,
    token: CancellationToken,
}

impl CancellationGuard<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CancellationGuard<'_> {
    fn drop(&mut self) {
        self.registry.active.remove(&self.key);
    }
}
