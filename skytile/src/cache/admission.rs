//! Admission policy: which fetched responses may be cached.

use crate::fetch::FetchResponse;

/// Content types eligible for caching (case-insensitive substring match).
pub const CACHEABLE_CONTENT_TYPES: [&str; 3] =
    ["image/", "application/fits", "application/octet-stream"];

/// Outcome of the admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Status outside 2xx.
    NotSuccess,
    /// Unreadable cross-origin result.
    Opaque,
    /// Content type not on the allow-list.
    ContentType,
    /// Empty body.
    EmptyBody,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Admission::Admit => "admit",
            Admission::NotSuccess => "non-2xx status",
            Admission::Opaque => "opaque response",
            Admission::ContentType => "content type not cacheable",
            Admission::EmptyBody => "empty body",
        }
    }
}

/// Decide whether a response may be stored.
pub fn admit(response: &FetchResponse) -> Admission {
    if !response.is_success() {
        return Admission::NotSuccess;
    }
    if response.opaque {
        return Admission::Opaque;
    }

    let content_type = response.content_type().to_ascii_lowercase();
    if !CACHEABLE_CONTENT_TYPES
        .iter()
        .any(|allowed| content_type.contains(allowed))
    {
        return Admission::ContentType;
    }

    if response.body.is_empty() {
        return Admission::EmptyBody;
    }

    Admission::Admit
}
