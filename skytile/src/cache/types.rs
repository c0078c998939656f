//! Cache entry type.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::fetch::{FetchResponse, Headers, CACHE_HIT_HEADER, CACHE_HIT_VALUE};

/// A cached tile response.
///
/// Owned by the store once inserted. Readers get clones; the body is a
/// reference-counted immutable buffer, so a clone never exposes bytes that
/// another holder could change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Bytes,
    pub content_type: String,
    pub status: u16,
    pub status_text: String,
    pub created_at: Instant,
    pub last_access_at: Instant,
}

impl CacheEntry {
    /// Capture a fetched response.
    pub fn from_response(response: &FetchResponse, now: Instant) -> Self {
        Self {
            body: response.body.clone(),
            content_type: response.content_type().to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            created_at: now,
            last_access_at: now,
        }
    }

    /// Age relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Whether the entry has outlived `ttl`.
    ///
    /// An entry exactly `ttl` old is still fresh.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) > ttl
    }

    /// Synthesize a response carrying the cache-hit marker.
    pub fn to_response(&self) -> FetchResponse {
        let mut headers = Headers::new();
        headers.insert("content-type", self.content_type.clone());
        headers.insert(CACHE_HIT_HEADER, CACHE_HIT_VALUE);

        FetchResponse {
            status: self.status,
            status_text: self.status_text.clone(),
            headers,
            body: self.body.clone(),
            opaque: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::tile_response;

    #[test]
    fn test_from_response_copies_metadata() {
        let now = Instant::now();
        let response = tile_response("image/png", &[9, 8, 7]);

        let entry = CacheEntry::from_response(&response, now);

        assert_eq!(entry.body.as_ref(), &[9, 8, 7]);
        assert_eq!(entry.content_type, "image/png");
        assert_eq!(entry.status, 200);
        assert_eq!(entry.status_text, "OK");
        assert_eq!(entry.created_at, now);
        assert_eq!(entry.last_access_at, now);
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Instant::now();
        let entry = CacheEntry::from_response(&tile_response("image/png", &[1]), now);
        let ttl = Duration::from_millis(90_000);

        assert!(!entry.is_expired(now + ttl, ttl));
        assert!(entry.is_expired(now + ttl + Duration::from_millis(1), ttl));
    }

    #[test]
    fn test_to_response_marks_cache_hit() {
        let now = Instant::now();
        let entry = CacheEntry::from_response(&tile_response("image/jpeg", &[1, 2, 3]), now);

        let response = entry.to_response();

        assert!(response.is_cache_hit());
        assert_eq!(response.content_type(), "image/jpeg");
        assert_eq!(response.body, entry.body);
        assert_eq!(response.status, 200);
    }
}
