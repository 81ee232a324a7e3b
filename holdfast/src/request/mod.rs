//! Request value types.
//!
//! A [`Request`] is immutable once built. Its [`Signature`] is computed by
//! [`RequestBuilder::build`] from the method, URI, headers and body, and is
//! recomputed whenever a transformation changes one of those parts.
//!
//! ```
//! use holdfast::request::{Method, Request};
//! use std::time::Duration;
//!
//! let request = Request::builder(Method::Post, "https://api.example.com/notes")
//!     .header("Content-Type", "application/json")
//!     .body(r#"{"text":"hello"}"#)
//!     .timeout(Duration::from_secs(5))
//!     .tag("notes")
//!     .build();
//!
//! assert_eq!(request.method(), Method::Post);
//! assert!(request.has_tag("notes"));
//! ```

mod headers;
mod method;
mod signature;

pub use headers::Headers;
pub use method::{Method, UnknownMethod};
pub use signature::Signature;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier of one execution of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A logical outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    method: Method,
    uri: String,
    headers: Headers,
    #[serde(with = "body_base64", default)]
    body: Option<Bytes>,
    #[serde(with = "crate::time::duration_millis::option", default)]
    timeout: Option<Duration>,
    correlation_id: CorrelationId,
    #[serde(default)]
    tags: BTreeSet<String>,
    signature: Signature,
}

impl Request {
    /// Starts building a request.
    pub fn builder(method: Method, uri: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, uri)
    }

    /// Shorthand for a bodiless GET.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::builder(Method::Get, uri).build()
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-request timeout, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns a copy with `defaults` merged into the headers.
    ///
    /// Headers already present on the request win. The signature is
    /// recomputed.
    pub fn with_default_headers(&self, defaults: &Headers) -> Self {
        let mut headers = self.headers.clone();
        headers.merge_defaults(defaults);
        let signature =
            Signature::compute(self.method, &self.uri, &headers, self.body.as_deref());
        Self {
            headers,
            signature,
            ..self.clone()
        }
    }

    /// Returns a copy with a fresh correlation id and the same signature.
    pub fn with_new_correlation_id(&self) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            ..self.clone()
        }
    }

    /// Returns a copy using `timeout` when no per-request timeout is set.
    pub(crate) fn with_timeout_fallback(&self, timeout: Duration) -> Self {
        Self {
            timeout: Some(self.timeout.unwrap_or(timeout)),
            ..self.clone()
        }
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    uri: String,
    headers: Headers,
    body: Option<Bytes>,
    timeout: Option<Duration>,
    correlation_id: Option<CorrelationId>,
    tags: BTreeSet<String>,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: None,
            timeout: None,
            correlation_id: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: Headers) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Uses a caller-chosen correlation id instead of a random one.
    pub fn correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn build(self) -> Request {
        let signature =
            Signature::compute(self.method, &self.uri, &self.headers, self.body.as_deref());
        Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
            correlation_id: self.correlation_id.unwrap_or_default(),
            tags: self.tags,
            signature,
        }
    }
}

mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded)
                .map(|raw| Some(Bytes::from(raw)))
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
