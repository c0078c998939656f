//! Tile transport capability.
//!
//! The engine never talks to the network directly: every request goes
//! through a [`Fetcher`], injected at construction time.
//!
//! ```ignore
//! use std::sync::Arc;
//! use skytile::fetch::{FetchRequest, ReqwestFetcher};
//!
//! let fetcher = Arc::new(ReqwestFetcher::new()?);
//! let response = fetcher.fetch(FetchRequest::get(url)).await?;
//! ```

mod http;
mod types;

pub use http::{Fetcher, ReqwestFetcher, DEFAULT_TIMEOUT_SECS};
pub use types::{
    CacheMode, CredentialsMode, FetchError, FetchHints, FetchPurpose, FetchRequest,
    FetchResponse, Headers, Method, CACHE_HIT_HEADER, CACHE_HIT_VALUE,
};

#[cfg(test)]
pub use http::tests::{tile_response, ScriptedFetcher};
