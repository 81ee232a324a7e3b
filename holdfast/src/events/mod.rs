//! Observable event stream.
//!
//! Components publish [`Event`]s through a shared [`EventEmitter`]. Any
//! number of observers may subscribe; [`spawn_event_logger`] is the
//! built-in one that forwards events to `tracing`.

mod emitter;
mod event;
mod logger;

pub use emitter::{EventEmitter, DEFAULT_EVENT_CAPACITY};
pub use event::{Event, EvictionReason, RequestMetrics};
pub use logger::{log_event, spawn_event_logger};
