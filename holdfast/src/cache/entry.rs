use crate::request::Headers;
use crate::time::to_chrono;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(with = "payload_base64")]
    pub payload: Bytes,
    pub status: u16,
    pub headers: Headers,
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::time::duration_millis::option", default)]
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    pub fn new(
        payload: Bytes,
        status: u16,
        headers: Headers,
        created_at: DateTime<Utc>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            payload,
            status,
            headers,
            created_at,
            ttl,
        }
    }

    /// True once `now` is strictly past `created_at + ttl`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => match self.created_at.checked_add_signed(to_chrono(ttl)) {
                Some(expires_at) => now > expires_at,
                None => false,
            },
            None => false,
        }
    }
}

mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_boundary_is_strict() {
        let created = Utc::now();
        let entry = CacheEntry::new(
            Bytes::from("x"),
            200,
            Headers::new(),
            created,
            Some(Duration::from_secs(10)),
        );

        assert!(!entry.is_expired_at(created));
        assert!(!entry.is_expired_at(created + chrono::Duration::seconds(10)));
        assert!(entry.is_expired_at(created + chrono::Duration::milliseconds(10_001)));
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let created = Utc::now();
        let entry = CacheEntry::new(Bytes::new(), 200, Headers::new(), created, None);

        assert!(!entry.is_expired_at(created + chrono::Duration::days(3650)));
    }

    #[test]
    fn test_json_round_trip() {
        let entry = CacheEntry::new(
            Bytes::from_static(&[0, 1, 2, 255]),
            203,
            Headers::new().with("ETag", "\"v1\""),
            Utc::now(),
            Some(Duration::from_millis(1500)),
        );

        let json = serde_json::to_vec(&entry).unwrap();
        let restored: CacheEntry = serde_json::from_slice(&json).unwrap();

        assert_eq!(restored, entry);
    }
}
