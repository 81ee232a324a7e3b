//! Request coalescing for identical in-flight requests.
//!
//! When several callers submit requests with the same signature at once,
//! only the first (the leader) runs the pipeline. The others subscribe to
//! the leader's result and decode it themselves.
//!
//! ```text
//! Caller A ─┐
//!           │                                 Transport
//! Caller B ─┼──► RequestCoalescer ──► leader ──► call
//!           │        │                              │
//! Caller C ─┘        ▼                              ▼
//!             [A, B, C share one Exchange] ◄────────┘
//! ```
//!
//! # Implementation
//!
//! Uses `DashMap`'s entry API for atomic check-and-insert and a broadcast
//! channel per signature. Markers older than the dedup window are stale:
//! a new request replaces them, and registration sweeps them out.

use super::exchange::Exchange;
use crate::request::Signature;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::debug;

struct InFlight {
    tx: broadcast::Sender<Arc<Exchange>>,
    started: Instant,
    generation: u64,
}

/// Tracks in-flight signatures.
#[derive(Default)]
pub(crate) struct RequestCoalescer {
    in_flight: DashMap<Signature, InFlight>,
    next_generation: AtomicU64,
}

/// Result of registering a request.
pub(crate) enum Registration<'a> {
    /// No live execution exists; the caller runs the pipeline.
    Leader(LeaderGuard<'a>),
    /// Another execution is running; wait on this receiver.
    Waiter(broadcast::Receiver<Arc<Exchange>>),
}

impl RequestCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, signature: &Signature, window: Duration) -> Registration<'_> {
        self.sweep_stale(window);

        match self.in_flight.entry(signature.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().started.elapsed() <= window {
                    debug!(signature = %signature.short(), "Coalescing with in-flight request");
                    return Registration::Waiter(entry.get().tx.subscribe());
                }
                debug!(signature = %signature.short(), "Replacing stale in-flight marker");
                let (in_flight, generation) = self.new_marker();
                entry.insert(in_flight);
                Registration::Leader(LeaderGuard {
                    coalescer: self,
                    signature: signature.clone(),
                    generation,
                    completed: false,
                })
            }
            Entry::Vacant(entry) => {
                let (in_flight, generation) = self.new_marker();
                entry.insert(in_flight);
                Registration::Leader(LeaderGuard {
                    coalescer: self,
                    signature: signature.clone(),
                    generation,
                    completed: false,
                })
            }
        }
    }

    /// Number of signatures currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Drops markers older than `window`. Returns how many were removed.
    pub fn sweep_stale(&self, window: Duration) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|_, f| f.started.elapsed() <= window);
        before.saturating_sub(self.in_flight.len())
    }

    fn new_marker(&self) -> (InFlight, u64) {
        // Typical fan-in is a handful of callers per signature
        let (tx, _rx) = broadcast::channel(16);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        (
            InFlight {
                tx,
                started: Instant::now(),
                generation,
            },
            generation,
        )
    }

    /// Removes the marker if it still belongs to `generation`.
    fn take(&self, signature: &Signature, generation: u64) -> Option<InFlight> {
        self.in_flight
            .remove_if(signature, |_, f| f.generation == generation)
            .map(|(_, f)| f)
    }
}

/// Held by the leader. Completing broadcasts the result; dropping without
/// completing closes the channel so waiters run the pipeline themselves.
pub(crate) struct LeaderGuard<'a> {
    coalescer: &'a RequestCoalescer,
    signature: Signature,
    generation: u64,
    completed: bool,
}

impl LeaderGuard<'_> {
    pub fn complete(mut self, exchange: Arc<Exchange>) {
        self.completed = true;
        // Remove before sending so late arrivals start a fresh execution
        // instead of subscribing to a channel that already fired.
        if let Some(in_flight) = self.coalescer.take(&self.signature, self.generation) {
            let waiters = in_flight.tx.receiver_count();
            let _ = in_flight.tx.send(exchange);
            if waiters > 0 {
                debug!(
                    signature = %self.signature.short(),
                    waiters = waiters,
                    "Broadcast result to coalesced waiters"
                );
            }
        }
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.coalescer.take(&self.signature, self.generation);
        }
    }
}
