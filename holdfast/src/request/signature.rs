//! Deterministic request signatures.
//!
//! A signature identifies a logical operation for both caching and
//! deduplication. It covers the method, the URI, the header set and the
//! body. Header order and header name case do not change the signature;
//! the correlation id and tags never participate.

use super::headers::Headers;
use super::method::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest identifying a logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Computes the signature for the given request components.
    pub fn compute(method: Method, uri: &str, headers: &Headers, body: Option<&[u8]>) -> Self {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, method.as_str().as_bytes());
        update_field(&mut hasher, uri.as_bytes());
        for (name, value) in headers.canonical() {
            update_field(&mut hasher, name.as_bytes());
            update_field(&mut hasher, value.as_bytes());
        }
        match body {
            Some(body) => {
                hasher.update([1u8]);
                update_field(&mut hasher, body);
            }
            None => hasher.update([0u8]),
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps an already computed digest.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Length prefix keeps ("ab", "c") distinct from ("a", "bc").
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(method: Method, uri: &str, headers: &Headers, body: Option<&[u8]>) -> Signature {
        Signature::compute(method, uri, headers, body)
    }

    #[test]
    fn test_signature_is_deterministic() {
        let headers = Headers::new().with("Accept", "application/json");
        let a = sig(Method::Get, "https://api.test/items", &headers, None);
        let b = sig(Method::Get, "https://api.test/items", &headers, None);

        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_header_order_and_case_do_not_matter() {
        let h1 = Headers::new().with("Accept", "a").with("X-Trace", "1");
        let h2 = Headers::new().with("x-trace", "1").with("accept", "a");

        assert_eq!(
            sig(Method::Get, "/x", &h1, None),
            sig(Method::Get, "/x", &h2, None)
        );
    }

    #[test]
    fn test_each_component_changes_signature() {
        let headers = Headers::new();
        let base = sig(Method::Post, "/x", &headers, Some(b"body"));

        assert_ne!(base, sig(Method::Put, "/x", &headers, Some(b"body")));
        assert_ne!(base, sig(Method::Post, "/y", &headers, Some(b"body")));
        assert_ne!(base, sig(Method::Post, "/x", &headers, Some(b"other")));
        assert_ne!(
            base,
            sig(Method::Post, "/x", &Headers::new().with("A", "b"), Some(b"body"))
        );
    }

    #[test]
    fn test_empty_body_differs_from_no_body() {
        let headers = Headers::new();
        assert_ne!(
            sig(Method::Post, "/x", &headers, None),
            sig(Method::Post, "/x", &headers, Some(b""))
        );
    }

    #[test]
    fn test_short_prefix() {
        let s = sig(Method::Get, "/x", &Headers::new(), None);
        assert_eq!(s.short().len(), 12);
        assert!(s.as_str().starts_with(s.short()));
    }
}
