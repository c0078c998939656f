//! Lock-free atomic metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::TelemetrySnapshot;

/// Lock-free counters for the engine.
///
/// All operations use `Relaxed` ordering; the counters are independent
/// measurements with no ordering relationship between them.
#[derive(Debug)]
pub struct EngineMetrics {
    /// When metrics collection started
    start_time: Instant,

    // === Request path ===
    /// Requests forwarded without caching
    pass_throughs: AtomicU64,
    /// Tile requests served from the cache
    cache_hits: AtomicU64,
    /// Tile requests that missed the cache
    cache_misses: AtomicU64,
    /// Tile requests that joined an in-flight fetch
    coalesced: AtomicU64,

    // === Origin fetches ===
    /// Foreground fetches sent to the transport for tiles
    origin_fetches: AtomicU64,
    /// Foreground fetches that failed at the transport
    origin_failures: AtomicU64,
    /// Bytes received from origin (foreground and prefetch)
    bytes_fetched: AtomicU64,
    /// Responses admitted to the cache
    responses_stored: AtomicU64,
    /// Responses the admission policy rejected
    admission_rejections: AtomicU64,
    /// Results that landed after their session was torn down
    late_results_discarded: AtomicU64,

    // === Prefetch ===
    /// Seeds dropped by the cooldown
    seeds_cooled_down: AtomicU64,
    /// Debounce timer firings that produced a batch
    prefetch_batches: AtomicU64,
    /// Neighbor fetches issued
    prefetch_issued: AtomicU64,
    /// Neighbor fetches whose result was cached
    prefetch_stored: AtomicU64,
    /// Neighbor fetches that failed or were rejected
    prefetch_failed: AtomicU64,
    /// Neighbors skipped because they were cached or in flight
    prefetch_skipped: AtomicU64,
}

impl EngineMetrics {
    /// Creates a new metrics instance.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            pass_throughs: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            origin_fetches: AtomicU64::new(0),
            origin_failures: AtomicU64::new(0),
            bytes_fetched: AtomicU64::new(0),
            responses_stored: AtomicU64::new(0),
            admission_rejections: AtomicU64::new(0),
            late_results_discarded: AtomicU64::new(0),
            seeds_cooled_down: AtomicU64::new(0),
            prefetch_batches: AtomicU64::new(0),
            prefetch_issued: AtomicU64::new(0),
            prefetch_stored: AtomicU64::new(0),
            prefetch_failed: AtomicU64::new(0),
            prefetch_skipped: AtomicU64::new(0),
        }
    }

    // === Request path ===

    pub fn pass_through(&self) {
        self.pass_throughs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    // === Origin fetches ===

    /// Record a successful foreground origin fetch of `bytes` bytes.
    pub fn origin_fetch_completed(&self, bytes: u64) {
        self.origin_fetches.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a foreground origin fetch that produced no response.
    pub fn origin_fetch_failed(&self) {
        self.origin_fetches.fetch_add(1, Ordering::Relaxed);
        self.origin_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn response_stored(&self) {
        self.responses_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn admission_rejected(&self) {
        self.admission_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn late_result_discarded(&self) {
        self.late_results_discarded.fetch_add(1, Ordering::Relaxed);
    }

    // === Prefetch ===

    pub fn seed_cooled_down(&self) {
        self.seeds_cooled_down.fetch_add(1, Ordering::Relaxed);
    }

    pub fn prefetch_batch(&self) {
        self.prefetch_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn prefetch_issued(&self) {
        self.prefetch_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a prefetched neighbor that was cached.
    pub fn prefetch_stored(&self, bytes: u64) {
        self.prefetch_stored.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn prefetch_failed(&self) {
        self.prefetch_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn prefetch_skipped(&self) {
        self.prefetch_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            uptime: self.start_time.elapsed(),
            pass_throughs: self.pass_throughs.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            origin_fetches: self.origin_fetches.load(Ordering::Relaxed),
            origin_failures: self.origin_failures.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
            responses_stored: self.responses_stored.load(Ordering::Relaxed),
            admission_rejections: self.admission_rejections.load(Ordering::Relaxed),
            late_results_discarded: self.late_results_discarded.load(Ordering::Relaxed),
            seeds_cooled_down: self.seeds_cooled_down.load(Ordering::Relaxed),
            prefetch_batches: self.prefetch_batches.load(Ordering::Relaxed),
            prefetch_issued: self.prefetch_issued.load(Ordering::Relaxed),
            prefetch_stored: self.prefetch_stored.load(Ordering::Relaxed),
            prefetch_failed: self.prefetch_failed.load(Ordering::Relaxed),
            prefetch_skipped: self.prefetch_skipped.load(Ordering::Relaxed),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
