//! Network transport abstraction.
//!
//! The orchestrator never talks to the network directly. It sends requests
//! through a [`Transport`], which lets the wire stack be swapped out (the
//! crate ships [`ReqwestTransport`]) and lets tests script responses with
//! [`mock::MockTransport`].
//!
//! A transport returns every response it receives, whatever the status; the
//! orchestrator decides which statuses count as failures.

mod decoder;
mod http;
pub mod mock;

pub use decoder::{BytesDecoder, DecodeError, JsonDecoder, ResponseDecoder, TextDecoder};
pub use http::ReqwestTransport;

use crate::outcome::FailureKind;
use crate::request::{Headers, Request};
use bytes::Bytes;
use futures::future::BoxFuture;
use std::time::Duration;
use thiserror::Error;

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors produced while executing a request.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("server responded with status {status}")]
    Status {
        status: u16,
        headers: Headers,
        body: Bytes,
    },

    #[error("network is offline")]
    Offline,

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Maps the error variant onto the failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            TransportError::Connect(_) | TransportError::Offline => FailureKind::Network,
            TransportError::Timeout(_) => FailureKind::Timeout,
            TransportError::Cancelled => FailureKind::Cancelled,
            TransportError::Status { .. } => FailureKind::BadResponse,
            TransportError::Other(_) => FailureKind::Unknown,
        }
    }

    /// Response status, for status errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Converts a non-2xx response into a status error.
    pub fn from_response(response: TransportResponse) -> Self {
        TransportError::Status {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

/// Executes requests over the network.
pub trait Transport: Send + Sync + 'static {
    /// Sends a request and returns the raw response.
    ///
    /// Implementations should honour [`Request::timeout`] where they can;
    /// the orchestrator also enforces it around every attempt.
    fn send<'a>(&'a self, request: &'a Request)
        -> BoxFuture<'a, Result<TransportResponse, TransportError>>;

    /// Releases any resources held by the transport.
    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}
