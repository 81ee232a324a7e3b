//! Scriptable transport for tests.
//!
//! ```
//! use holdfast::transport::mock::{MockReply, MockTransport};
//! use holdfast::transport::TransportResponse;
//!
//! let transport = MockTransport::new()
//!     .then(MockReply::status(503))
//!     .then(MockReply::ok("done"));
//! assert_eq!(transport.calls(), 0);
//! ```

use super::{Transport, TransportError, TransportResponse};
use crate::request::Request;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    result: Result<TransportResponse, TransportError>,
    delay: Option<Duration>,
}

impl MockReply {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<bytes::Bytes>) -> Self {
        Self::respond(TransportResponse::new(200, body))
    }

    /// An empty response with the given status.
    pub fn status(status: u16) -> Self {
        Self::respond(TransportResponse::new(status, ""))
    }

    pub fn respond(response: TransportResponse) -> Self {
        Self {
            result: Ok(response),
            delay: None,
        }
    }

    pub fn fail(error: TransportError) -> Self {
        Self {
            result: Err(error),
            delay: None,
        }
    }

    /// Waits before replying. Uses tokio time, so paused-clock tests
    /// advance through it instantly.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct Script {
    replies: VecDeque<MockReply>,
    fallback: Option<MockReply>,
    requests: Vec<Request>,
}

/// Transport that replays scripted replies in order.
///
/// Once the script is exhausted the fallback reply is used (a 200 with an
/// empty body unless [`MockTransport::otherwise`] sets one). Clones share
/// the same script and counters.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reply to the script.
    pub fn then(self, reply: MockReply) -> Self {
        self.push(reply);
        self
    }

    /// Sets the reply used once the script runs out.
    pub fn otherwise(self, reply: MockReply) -> Self {
        self.script.lock().fallback = Some(reply);
        self
    }

    pub fn push(&self, reply: MockReply) {
        self.script.lock().replies.push_back(reply);
    }

    /// Number of `send` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.script.lock().requests.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) > 0
    }

    fn next_reply(&self, request: &Request) -> MockReply {
        let mut script = self.script.lock();
        script.requests.push(request.clone());
        script
            .replies
            .pop_front()
            .or_else(|| script.fallback.clone())
            .unwrap_or_else(|| MockReply::ok(""))
    }
}

impl Transport for MockTransport {
    fn send<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply(request);
        Box::pin(async move {
            if let Some(delay) = reply.delay {
                tokio::time::sleep(delay).await;
            }
            reply.result
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }
}
