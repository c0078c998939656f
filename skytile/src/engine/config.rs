//! Engine configuration.
//!
//! [`EngineConfig`] gathers every tunable of the cache and the prefetcher
//! and hands out the per-component configs.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::cache::{CacheStoreConfig, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use crate::prefetch::{
    PrefetchConfig, DEFAULT_MAX_ORDER, DEFAULT_MAX_PREFETCH_PER_TILE, DEFAULT_PREFETCH_COOLDOWN,
    DEFAULT_PREFETCH_DEBOUNCE,
};

/// Configuration for a tile [`Engine`](super::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum age of a cached tile. Default: 90 s.
    pub ttl: Duration,
    /// Maximum number of cached tiles. Default: 256.
    ///
    /// A value of 0 is treated as 1.
    pub max_entries: usize,
    /// Whether successful fetches trigger neighbor prefetch. Default: true.
    pub prefetch_enabled: bool,
    /// Neighbors prefetched per seed. Default: 10.
    pub max_prefetch_per_tile: usize,
    /// Per-seed cooldown. Default: 1 s.
    pub prefetch_cooldown: Duration,
    /// Debounce window before a batch runs. Default: 350 ms.
    pub prefetch_debounce: Duration,
    /// Deepest order that gets children. Default: 15.
    pub max_order: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
            prefetch_enabled: true,
            max_prefetch_per_tile: DEFAULT_MAX_PREFETCH_PER_TILE,
            prefetch_cooldown: DEFAULT_PREFETCH_COOLDOWN,
            prefetch_debounce: DEFAULT_PREFETCH_DEBOUNCE,
            max_order: DEFAULT_MAX_ORDER,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the cache size limit.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Enable or disable neighbor prefetch.
    pub fn with_prefetch_enabled(mut self, enabled: bool) -> Self {
        self.prefetch_enabled = enabled;
        self
    }

    /// Set the per-seed neighbor cap.
    pub fn with_max_prefetch_per_tile(mut self, max: usize) -> Self {
        self.max_prefetch_per_tile = max;
        self
    }

    /// Set the per-seed cooldown.
    pub fn with_prefetch_cooldown(mut self, cooldown: Duration) -> Self {
        self.prefetch_cooldown = cooldown;
        self
    }

    /// Set the debounce window.
    pub fn with_prefetch_debounce(mut self, debounce: Duration) -> Self {
        self.prefetch_debounce = debounce;
        self
    }

    /// Set the deepest order that gets children.
    pub fn with_max_order(mut self, max_order: u32) -> Self {
        self.max_order = max_order;
        self
    }

    /// Cache store bounds.
    pub fn cache_config(&self) -> CacheStoreConfig {
        CacheStoreConfig {
            max_entries: NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN),
            ttl: self.ttl,
        }
    }

    /// Prefetch scheduler settings.
    pub fn prefetch_config(&self) -> PrefetchConfig {
        PrefetchConfig {
            enabled: self.prefetch_enabled,
            debounce: self.prefetch_debounce,
            cooldown: self.prefetch_cooldown,
            max_per_tile: self.max_prefetch_per_tile,
            max_order: self.max_order,
        }
    }
}
