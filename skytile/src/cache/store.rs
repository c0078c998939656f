//! In-memory tile cache with TTL expiry and LRU eviction.
//!
//! Entries are keyed by canonical tile URL. Every successful `get` moves the
//! entry to the most-recently-used position; `put` inserts at that position
//! and then enforces the bounds before returning:
//!
//! 1. every expired entry is swept out
//! 2. least-recently-used entries are evicted until `len <= max_entries`
//!
//! Expired entries are also dropped lazily whenever a lookup touches them.
//!
//! # Locking
//!
//! A single `parking_lot::Mutex` guards the LRU list. Every operation is a
//! short, I/O-free critical section, so holding a blocking lock is fine
//! even from async tasks, and all mutations are linearizable.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use super::admission::{admit, Admission};
use super::types::CacheEntry;
use crate::clock::Clock;
use crate::fetch::FetchResponse;

/// Default maximum number of cached tiles.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

/// Default time-to-live for cached tiles.
pub const DEFAULT_TTL: Duration = Duration::from_millis(90_000);

/// Cache store bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStoreConfig {
    /// Hard ceiling on the number of entries (at least 1).
    pub max_entries: NonZeroUsize,
    /// Maximum age of an entry.
    pub ttl: Duration,
}

impl Default for CacheStoreConfig {
    fn default() -> Self {
        Self {
            max_entries: NonZeroUsize::new(DEFAULT_MAX_ENTRIES).unwrap_or(NonZeroUsize::MIN),
            ttl: DEFAULT_TTL,
        }
    }
}

/// Counters describing store activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
    /// Entries dropped to respect `max_entries`.
    pub evictions: u64,
    pub entry_count: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit (0.0 when there were none).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded tile cache.
pub struct TileCacheStore {
    entries: Mutex<LruCache<String, CacheEntry>>,
    config: CacheStoreConfig,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    expirations: AtomicU64,
    evictions: AtomicU64,
}

impl TileCacheStore {
    /// Create an empty store.
    ///
    /// # Arguments
    ///
    /// * `config` - Size and TTL bounds
    /// * `clock` - Time source for TTL checks
    pub fn new(config: CacheStoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            config,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insertions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up a fresh entry.
    ///
    /// On a hit the entry becomes most-recently-used and its
    /// `last_access_at` is refreshed. An expired entry is removed and
    /// reported as a miss.
    pub fn get(&self, url: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = match entries.peek(url) {
            Some(entry) => entry.is_expired(now, self.config.ttl),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(url);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Tile cache entry expired");
            return None;
        }

        let entry = entries.get_mut(url)?;
        entry.last_access_at = now;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.clone())
    }

    /// Check for a fresh entry without changing its recency.
    ///
    /// Expired entries are still removed.
    pub fn contains_fresh(&self, url: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        match entries.peek(url) {
            Some(entry) if entry.is_expired(now, self.config.ttl) => {
                entries.pop(url);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Insert or replace an entry, then enforce TTL and size bounds.
    ///
    /// The store never exceeds `max_entries` once this returns.
    pub fn put(&self, url: impl Into<String>, entry: CacheEntry) {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        entries.put(url.into(), entry);
        self.insertions.fetch_add(1, Ordering::Relaxed);

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now, self.config.ttl))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            self.expirations
                .fetch_add(expired.len() as u64, Ordering::Relaxed);
        }

        let mut evicted = 0u64;
        while entries.len() > self.config.max_entries.get() {
            if entries.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
            trace!(evicted, size = entries.len(), "Tile cache evicted LRU entries");
        }
    }

    /// Store `response` under `url` if the admission policy accepts it.
    ///
    /// Returns the admission verdict either way.
    pub fn store_response(&self, url: &str, response: &FetchResponse) -> Admission {
        let verdict = admit(response);
        if verdict.is_admitted() {
            self.put(url, CacheEntry::from_response(response, self.clock.now()));
        }
        verdict
    }

    /// Remove one entry. Returns `true` if it existed.
    pub fn remove(&self, url: &str) -> bool {
        self.entries.lock().pop(url).is_some()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of entries currently held, including any not yet swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn config(&self) -> CacheStoreConfig {
        self.config
    }

    /// Get store statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.len(),
        }
    }
}

impl std::fmt::Debug for TileCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCacheStore")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
