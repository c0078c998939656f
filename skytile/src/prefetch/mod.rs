//! Predictive neighbor prefetch.
//!
//! After a tile is fetched from origin and cached, its neighbors (planar
//! offsets, children, parent) are fetched in the background so panning
//! and zooming are served from the cache.
//!
//! # Rate limiting
//!
//! - **Debounce**: seeds collect for [`PrefetchConfig::debounce`] before a
//!   batch runs, so a burst of fetches produces one batch.
//! - **Cooldown**: a seed seen again within [`PrefetchConfig::cooldown`]
//!   does not contribute again.
//! - **Cap**: at most [`PrefetchConfig::max_per_tile`] neighbors per seed.
//!
//! There is no separate concurrency limit on outbound prefetches.

mod config;
mod scheduler;

pub use config::{
    PrefetchConfig, DEFAULT_MAX_ORDER, DEFAULT_MAX_PREFETCH_PER_TILE, DEFAULT_PREFETCH_COOLDOWN,
    DEFAULT_PREFETCH_DEBOUNCE,
};
pub use scheduler::{PrefetchScheduler, SeedOutcome};
