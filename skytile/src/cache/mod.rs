//! Bounded in-memory tile cache.
//!
//! # Architecture
//!
//! ```text
//! FetchResponse ──► admit() ──► CacheEntry ──► TileCacheStore
//!                     │                          │
//!                     ▼                          ▼
//!              rejected: returned        get(): fresh copy, MRU touch
//!              but never stored          put(): sweep expired, evict LRU
//! ```
//!
//! - [`admission`]: which responses may be stored
//! - [`TileCacheStore`]: TTL + LRU keyed by canonical tile URL
//! - [`CacheEntry`]: immutable snapshot of a cached response

pub mod admission;
mod store;
mod types;

pub use admission::{admit, Admission, CACHEABLE_CONTENT_TYPES};
pub use store::{CacheStats, CacheStoreConfig, TileCacheStore, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use types::CacheEntry;
