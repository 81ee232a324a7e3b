//! Typed results of request execution.
//!
//! Every execution resolves to an [`Outcome`]: either a [`Success`] carrying
//! the decoded payload or a [`Failure`] carrying a [`FailureKind`]. Both
//! variants carry [`OutcomeMeta`] describing the execution.

use crate::request::{CorrelationId, Headers};
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Shared, type-erased failure cause.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Classification of a failed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection could not be established or was lost.
    Network,
    /// An attempt exceeded its timeout.
    Timeout,
    /// The execution was cancelled by the caller.
    Cancelled,
    /// The server answered with a non-success status, or the body could not
    /// be decoded.
    BadResponse,
    /// The request was stored in the offline queue for later replay.
    QueuedForLater,
    Unknown,
}

impl FailureKind {
    /// Returns true for failures that represent expected deferral.
    pub fn is_soft(&self) -> bool {
        matches!(self, FailureKind::QueuedForLater)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::BadResponse => "bad_response",
            FailureKind::QueuedForLater => "queued_for_later",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to every outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeMeta {
    /// Correlation id of the execution that produced the outcome.
    pub correlation_id: CorrelationId,
    /// When the outcome was produced.
    pub completed_at: DateTime<Utc>,
    /// Wall time from submission to completion.
    pub elapsed: Duration,
}

/// A successful execution.
#[derive(Debug, Clone)]
pub struct Success<T> {
    pub payload: T,
    pub status: u16,
    pub headers: Headers,
    /// True when served from the cache without a network call.
    pub from_cache: bool,
    /// Number of retries performed before this result.
    pub retry_count: u32,
    pub meta: OutcomeMeta,
}

/// A failed execution.
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: FailureKind,
    /// Response status, when the failure was caused by a response.
    pub status: Option<u16>,
    pub cause: Option<Cause>,
    pub retry_count: u32,
    pub meta: OutcomeMeta,
}

impl Failure {
    /// Renders the cause for log lines.
    pub fn cause_message(&self) -> Option<String> {
        self.cause.as_ref().map(|c| c.to_string())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " (status {})", status)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// Result of executing a request.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(Success<T>),
    Failure(Failure),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The failure kind, or `None` for a success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(f) => Some(f.kind),
        }
    }

    pub fn meta(&self) -> &OutcomeMeta {
        match self {
            Outcome::Success(s) => &s.meta,
            Outcome::Failure(f) => &f.meta,
        }
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            Outcome::Success(s) => s.retry_count,
            Outcome::Failure(f) => f.retry_count,
        }
    }

    /// Converts into a `Result`, keeping the full success record.
    pub fn into_result(self) -> Result<Success<T>, Failure> {
        match self {
            Outcome::Success(s) => Ok(s),
            Outcome::Failure(f) => Err(f),
        }
    }

    /// Maps the payload of a success, leaving failures untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success(s) => Outcome::Success(Success {
                payload: f(s.payload),
                status: s.status,
                headers: s.headers,
                from_cache: s.from_cache,
                retry_count: s.retry_count,
                meta: s.meta,
            }),
            Outcome::Failure(f) => Outcome::Failure(f),
        }
    }
}
