//! Orchestrator counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe request counters.
///
/// # Example
///
/// ```
/// use holdfast::orchestrator::OrchestratorStats;
///
/// let stats = OrchestratorStats::new();
/// stats.record_request();
/// stats.record_request();
/// stats.record_deduplicated();
///
/// assert_eq!(stats.snapshot().dedup_ratio(), 0.5);
/// ```
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    total_requests: AtomicU64,
    deduplicated: AtomicU64,
    cache_hits: AtomicU64,
    queued: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    cancelled: AtomicU64,
    retries: AtomicU64,
}

/// Point-in-time copy of [`OrchestratorStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    /// Requests that shared another execution's result.
    pub deduplicated: u64,
    pub cache_hits: u64,
    pub queued: u64,
    pub successes: u64,
    /// Failures other than cancellations and queue deferrals.
    pub failures: u64,
    pub cancelled: u64,
    pub retries: u64,
}

impl StatsSnapshot {
    /// Fraction of requests served by another execution (0.0 to 1.0).
    pub fn dedup_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.deduplicated as f64 / self.total_requests as f64
        }
    }
}

impl OrchestratorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
