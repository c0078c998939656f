//! Request and response types exchanged with a [`Fetcher`](super::Fetcher).

use std::fmt;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

/// Header set on responses synthesized from the tile cache.
pub const CACHE_HIT_HEADER: &str = "x-tile-cache";

/// Value of [`CACHE_HIT_HEADER`] on a cache hit.
pub const CACHE_HIT_VALUE: &str = "HIT";

/// HTTP request method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    /// Parse a method name, case-insensitively.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }

    /// Upper-case method name.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Other(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPurpose {
    /// Requested by a caller who is waiting for the result.
    #[default]
    Foreground,
    /// Speculative background fetch; failures are dropped.
    Prefetch,
}

/// HTTP cache mode hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Use any cached response regardless of staleness.
    ForceCache,
    NoStore,
}

/// Credentials hint for cross-origin requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialsMode {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// Optional transport hints.
///
/// Transports are free to ignore any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchHints {
    pub purpose: FetchPurpose,
    pub cache_mode: CacheMode,
    pub credentials: CredentialsMode,
    /// Request CORS mode rather than no-cors.
    pub cors: bool,
}

impl FetchHints {
    /// Hints used for background prefetches.
    pub fn prefetch() -> Self {
        Self {
            purpose: FetchPurpose::Prefetch,
            cache_mode: CacheMode::ForceCache,
            credentials: CredentialsMode::Omit,
            cors: true,
        }
    }

    /// Whether this is a background prefetch.
    pub fn is_prefetch(&self) -> bool {
        self.purpose == FetchPurpose::Prefetch
    }
}

/// A request handed to the engine or to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub hints: FetchHints,
}

impl FetchRequest {
    /// Plain GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            hints: FetchHints::default(),
        }
    }

    /// Request with an explicit method.
    ///
    /// A missing method means GET.
    pub fn with_method(url: impl Into<String>, method: Option<&str>) -> Self {
        Self {
            url: url.into(),
            method: method.map(Method::parse).unwrap_or_default(),
            hints: FetchHints::default(),
        }
    }

    /// Background prefetch of a tile URL.
    pub fn prefetch(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            hints: FetchHints::prefetch(),
        }
    }

    /// Replace the transport hints.
    pub fn hints(mut self, hints: FetchHints) -> Self {
        self.hints = hints;
        self
    }
}

/// Response headers.
///
/// Backed by reqwest's [`HeaderMap`], so names are case-insensitive and a
/// header sent more than once keeps every value. Names or values that are
/// not valid HTTP are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    map: HeaderMap,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing every previous value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        if let Some((name, value)) = header_pair(name.as_ref(), value.into()) {
            self.map.insert(name, value);
        }
    }

    /// Add a value, keeping any already present for the same name.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        if let Some((name, value)) = header_pair(name.as_ref(), value.into()) {
            self.map.append(name, value);
        }
    }

    /// First value of a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).and_then(|v| v.to_str().ok())
    }

    /// Every value of a header, in the order received.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.map
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Number of values, counting repeats.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over `(lower-case name, value)` pairs, one per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v)))
    }

    pub fn as_header_map(&self) -> &HeaderMap {
        &self.map
    }
}

fn header_pair(name: &str, value: String) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let value = HeaderValue::try_from(value).ok()?;
    Some((name, value))
}

impl From<HeaderMap> for Headers {
    fn from(map: HeaderMap) -> Self {
        Self { map }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// A transport response.
///
/// The body is reference-counted; cloning a response never copies bytes
/// and nobody can mutate a body another holder is reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub body: Bytes,
    /// Unreadable cross-origin result.
    pub opaque: bool,
}

impl FetchResponse {
    /// Response with the canonical reason phrase for `status`.
    pub fn new(status: u16, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers,
            body: body.into(),
            opaque: false,
        }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Declared content type, or an empty string.
    pub fn content_type(&self) -> &str {
        self.headers.get("content-type").unwrap_or("")
    }

    /// Whether this response was served from the tile cache.
    pub fn is_cache_hit(&self) -> bool {
        self.headers.get(CACHE_HIT_HEADER) == Some(CACHE_HIT_VALUE)
    }
}

/// Transport failure.
///
/// Cloneable so a single failed fetch can be reported to every waiter
/// that was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection, DNS, TLS or protocol failure.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The body could not be read.
    #[error("Failed to read response body: {0}")]
    Body(String),

    /// The URL could not be used by the transport.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    /// The transport could not be built.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        206 => "Partial Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
