//! Undecoded execution result shared between deduplicated callers.

use crate::outcome::{Cause, FailureKind};
use crate::transport::{TransportError, TransportResponse};
use std::sync::Arc;

/// What one pipeline run produced, before any caller decodes it.
#[derive(Debug, Clone)]
pub(crate) enum Exchange {
    Response {
        response: TransportResponse,
        from_cache: bool,
        retry_count: u32,
    },
    Failure {
        kind: FailureKind,
        status: Option<u16>,
        cause: Option<Cause>,
        retry_count: u32,
    },
}

impl Exchange {
    pub fn network(response: TransportResponse, retry_count: u32) -> Self {
        Exchange::Response {
            response,
            from_cache: false,
            retry_count,
        }
    }

    pub fn cached(response: TransportResponse, retry_count: u32) -> Self {
        Exchange::Response {
            response,
            from_cache: true,
            retry_count,
        }
    }

    pub fn error(error: TransportError, retry_count: u32) -> Self {
        Exchange::Failure {
            kind: error.kind(),
            status: error.status(),
            cause: Some(Arc::new(error)),
            retry_count,
        }
    }

    pub fn queued() -> Self {
        Exchange::Failure {
            kind: FailureKind::QueuedForLater,
            status: None,
            cause: None,
            retry_count: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Exchange::Failure {
                kind: FailureKind::Cancelled,
                ..
            }
        )
    }
}
