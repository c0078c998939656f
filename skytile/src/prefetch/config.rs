//! Configuration for neighbor prefetching.

use std::time::Duration;

pub use crate::address::DEFAULT_MAX_ORDER;

// ==================== Prefetch Defaults ====================

/// Default quiet period before a batch of seeds is expanded.
pub const DEFAULT_PREFETCH_DEBOUNCE: Duration = Duration::from_millis(350);

/// Default minimum interval between two batch contributions of one seed.
pub const DEFAULT_PREFETCH_COOLDOWN: Duration = Duration::from_millis(1_000);

/// Default cap on neighbors fetched per seed.
pub const DEFAULT_MAX_PREFETCH_PER_TILE: usize = 10;

/// Configuration for the prefetch scheduler.
///
/// Debounce and cooldown together bound the outbound request rate to
/// about one batch per debounce window, with each seed contributing at
/// most once per cooldown window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchConfig {
    /// Whether successful fetches seed prefetch at all.
    pub enabled: bool,

    /// Quiet period after the first seed before the batch runs.
    /// Default: 350 ms.
    pub debounce: Duration,

    /// Seeds repeated within this window are ignored.
    /// Default: 1 s.
    pub cooldown: Duration,

    /// Neighbors considered per seed, in neighbor order.
    /// Default: 10.
    pub max_per_tile: usize,

    /// Deepest order for which children are generated.
    /// Default: 15.
    pub max_order: u32,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: DEFAULT_PREFETCH_DEBOUNCE,
            cooldown: DEFAULT_PREFETCH_COOLDOWN,
            max_per_tile: DEFAULT_MAX_PREFETCH_PER_TILE,
            max_order: DEFAULT_MAX_ORDER,
        }
    }
}

impl PrefetchConfig {
    /// Configuration with prefetching switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
