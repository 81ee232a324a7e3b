//! Request orchestration.
//!
//! The [`Orchestrator`] runs every request through the same pipeline:
//! deduplication of identical in-flight requests, the offline short-circuit
//! (queue or cache), cache consultation, and retry-wrapped network
//! execution. Every execution resolves to an [`Outcome`](crate::outcome::Outcome).
//!
//! Queued requests are replayed with [`Orchestrator::replay_queue`], either
//! explicitly or by [`spawn_auto_replay`] when connectivity returns.

mod builder;
mod cancellation;
mod coalesce;
mod config;
mod engine;
mod exchange;
mod replay;
mod stats;

pub use builder::OrchestratorBuilder;
pub use config::{OrchestratorConfig, RequestOptions, DEFAULT_DEDUP_WINDOW, DEFAULT_TIMEOUT};
pub use engine::Orchestrator;
pub use replay::{spawn_auto_replay, ReplayError, ReplaySummary};
pub use stats::{OrchestratorStats, StatsSnapshot};
