//! Debounced neighbor prefetch.
//!
//! # Flow
//!
//! ```text
//! on_fetched(seed) ──► cooldown? ──► pending seeds ──► debounce timer
//!                        │ (drop)                          │ fires once
//!                        ▼                                 ▼
//!                                              drain seeds atomically
//!                                                          │
//!                                   ┌──────────────────────┼───────────┐
//!                                   ▼                      ▼           ▼
//!                            prefetch_around(s1)   prefetch_around(s2) ...
//!                            neighbors sequentially, skip cached / in-flight
//! ```
//!
//! All pending state lives under one mutex so a seed arriving while the
//! timer drains either lands in the drained batch or arms a fresh timer.
//! Every piece of work carries the session's [`CancellationToken`];
//! cancelling it stops the timer and any remaining neighbor fetches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::config::PrefetchConfig;
use crate::address::{neighbors, TileAddress};
use crate::cache::TileCacheStore;
use crate::clock::Clock;
use crate::coalesce::{BeginOutcome, InFlightRegistry};
use crate::fetch::{FetchRequest, Fetcher};
use crate::telemetry::EngineMetrics;

/// Outcome of [`PrefetchScheduler::on_fetched`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Added to the pending batch.
    Queued,
    /// Seeded again within the cooldown window.
    CooledDown,
    /// Prefetching is disabled or the session has ended.
    Ignored,
}

#[derive(Debug, Default)]
struct SchedulerState {
    /// Seeds awaiting the next batch, in arrival order.
    pending: Vec<TileAddress>,
    /// Whether a debounce timer is currently armed.
    timer_armed: bool,
    /// Last time each canonical URL was accepted as a seed.
    last_seeded: HashMap<String, Instant>,
}

/// Schedules background fetches of tiles adjacent to recently fetched ones.
pub struct PrefetchScheduler {
    config: PrefetchConfig,
    store: Arc<TileCacheStore>,
    registry: Arc<InFlightRegistry>,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<EngineMetrics>,
    state: Mutex<SchedulerState>,
}

impl PrefetchScheduler {
    /// Create a scheduler sharing the engine's cache, registry and transport.
    pub fn new(
        config: PrefetchConfig,
        store: Arc<TileCacheStore>,
        registry: Arc<InFlightRegistry>,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            fetcher,
            clock,
            metrics,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    /// Record a successful, cached origin fetch of `seed`.
    ///
    /// Must be called from within a tokio runtime; arming the debounce
    /// timer spawns a task.
    ///
    /// # Arguments
    ///
    /// * `seed` - The tile that was just fetched
    /// * `session` - Token of the activation session the fetch belongs to
    pub fn on_fetched(
        self: &Arc<Self>,
        seed: &TileAddress,
        session: &CancellationToken,
    ) -> SeedOutcome {
        if !self.config.enabled {
            return SeedOutcome::Ignored;
        }

        let key = seed.to_url();
        let now = self.clock.now();

        let mut state = self.state.lock();
        // Checked under the lock: clear() runs after cancellation and takes
        // this lock, so a seed can never outlive its session.
        if session.is_cancelled() {
            return SeedOutcome::Ignored;
        }

        if let Some(last) = state.last_seeded.get(&key) {
            if now.saturating_duration_since(*last) < self.config.cooldown {
                self.metrics.seed_cooled_down();
                trace!(url = %key, "Prefetch seed within cooldown");
                return SeedOutcome::CooledDown;
            }
        }

        state.last_seeded.insert(key, now);
        if !state.pending.contains(seed) {
            state.pending.push(seed.clone());
        }

        if !state.timer_armed {
            state.timer_armed = true;
            drop(state);
            self.arm_timer(session.clone());
        }

        SeedOutcome::Queued
    }

    /// Drop pending seeds, the timer flag and cooldown history.
    ///
    /// Call after cancelling the session token. Returns the number of
    /// seeds that were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        state.timer_armed = false;
        state.last_seeded.clear();
        dropped
    }

    /// Number of seeds waiting for the next batch.
    pub fn pending_seeds(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether a debounce timer is armed.
    pub fn timer_armed(&self) -> bool {
        self.state.lock().timer_armed
    }

    fn arm_timer(self: &Arc<Self>, session: CancellationToken) {
        let scheduler = Arc::clone(self);
        let sleep = self.clock.sleep(self.config.debounce);

        tokio::spawn(async move {
            tokio::select! {
                biased;

                _ = session.cancelled() => {
                    trace!("Prefetch debounce timer cancelled");
                }

                _ = sleep => {
                    scheduler.fire(&session);
                }
            }
        });
    }

    /// Drain the pending seeds and start one prefetch task per seed.
    fn fire(self: &Arc<Self>, session: &CancellationToken) {
        let now = self.clock.now();
        let batch = {
            let mut state = self.state.lock();
            if session.is_cancelled() {
                return;
            }
            state.timer_armed = false;
            let cooldown = self.config.cooldown;
            state
                .last_seeded
                .retain(|_, seeded| now.saturating_duration_since(*seeded) < cooldown);
            std::mem::take(&mut state.pending)
        };

        if batch.is_empty() {
            return;
        }

        self.metrics.prefetch_batch();
        debug!(seeds = batch.len(), "Running prefetch batch");

        for seed in batch {
            let scheduler = Arc::clone(self);
            let session = session.clone();
            tokio::spawn(async move { scheduler.prefetch_around(seed, session).await });
        }
    }

    /// Fetch the neighbors of one seed, one at a time.
    ///
    /// Failures are logged and counted, never surfaced.
    async fn prefetch_around(&self, seed: TileAddress, session: CancellationToken) {
        let candidates = neighbors(&seed, self.config.max_order);

        for neighbor in candidates.into_iter().take(self.config.max_per_tile) {
            if session.is_cancelled() {
                trace!(seed = %seed, "Prefetch stopped by teardown");
                return;
            }

            let url = neighbor.to_url();
            if self.store.contains_fresh(&url) || self.registry.contains(&url) {
                self.metrics.prefetch_skipped();
                continue;
            }

            let guard = match self.registry.try_begin(&url) {
                BeginOutcome::Begun(guard) => guard,
                BeginOutcome::Joined(_) => {
                    self.metrics.prefetch_skipped();
                    continue;
                }
            };

            // Teardown may have landed while probing the cache and registry.
            if session.is_cancelled() {
                trace!(seed = %seed, "Prefetch stopped by teardown");
                return;
            }

            self.metrics.prefetch_issued();
            let result = self.fetcher.fetch(FetchRequest::prefetch(url.clone())).await;

            match &result {
                Ok(response) if session.is_cancelled() => {
                    self.metrics.late_result_discarded();
                    trace!(url = %url, status = response.status, "Prefetch result after teardown");
                }
                Ok(response) => {
                    let verdict = self.store.store_response(&url, response);
                    if verdict.is_admitted() {
                        self.metrics.prefetch_stored(response.body.len() as u64);
                        trace!(url = %url, bytes = response.body.len(), "Prefetched tile");
                    } else {
                        self.metrics.prefetch_failed();
                        debug!(url = %url, reason = verdict.as_str(), "Prefetched tile not cached");
                    }
                }
                Err(e) => {
                    self.metrics.prefetch_failed();
                    debug!(url = %url, error = %e, "Prefetch failed");
                }
            }

            // Cache populated first so the URL is never both uncached and
            // not in flight while a result exists.
            guard.complete(result);
        }
    }
}

impl std::fmt::Debug for PrefetchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchScheduler")
            .field("config", &self.config)
            .field("pending_seeds", &self.pending_seeds())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStoreConfig;
    use crate::clock::SystemClock;
    use crate::fetch::{FetchError, FetchPurpose, ScriptedFetcher};
    use std::time::Duration;

    struct Harness {
        scheduler: Arc<PrefetchScheduler>,
        fetcher: Arc<ScriptedFetcher>,
        store: Arc<TileCacheStore>,
        registry: Arc<InFlightRegistry>,
        metrics: Arc<EngineMetrics>,
    }

    fn harness_with(config: PrefetchConfig, fetcher: ScriptedFetcher) -> Harness {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let fetcher = Arc::new(fetcher);
        let store = Arc::new(TileCacheStore::new(
            CacheStoreConfig::default(),
            Arc::clone(&clock),
        ));
        let registry = Arc::new(InFlightRegistry::new());
        let metrics = Arc::new(EngineMetrics::new());
        let scheduler = Arc::new(PrefetchScheduler::new(
            config,
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            clock,
            Arc::clone(&metrics),
        ));
        Harness {
            scheduler,
            fetcher,
            store,
            registry,
            metrics,
        }
    }

    fn harness() -> Harness {
        harness_with(PrefetchConfig::default(), ScriptedFetcher::new())
    }

    fn seed(pixel: u64) -> TileAddress {
        TileAddress::parse(&format!(
            "https://example.org/hips/Norder5/Dir0/Npix{}.jpg",
            pixel
        ))
        .unwrap()
    }

    /// Let virtual time pass and every spawned task run to idle.
    async fn settle(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_runs_after_debounce() {
        let h = harness();
        let session = CancellationToken::new();

        assert_eq!(h.scheduler.on_fetched(&seed(40), &session), SeedOutcome::Queued);
        assert_eq!(h.scheduler.pending_seeds(), 1);
        assert!(h.scheduler.timer_armed());

        settle(300).await;
        assert_eq!(h.fetcher.call_count(), 0, "nothing before the debounce window");

        settle(100).await;
        assert_eq!(h.fetcher.call_count(), 10);
        assert_eq!(h.scheduler.pending_seeds(), 0);
        assert!(!h.scheduler.timer_armed());
        assert_eq!(h.store.len(), 10);
        assert_eq!(h.registry.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_requests_use_prefetch_hints() {
        let h = harness();
        let session = CancellationToken::new();

        h.scheduler.on_fetched(&seed(40), &session);
        settle(400).await;

        for request in h.fetcher.calls() {
            assert_eq!(request.hints.purpose, FetchPurpose::Prefetch);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_neighbors_fetched_in_order() {
        let h = harness();
        let session = CancellationToken::new();
        let s = seed(40);

        h.scheduler.on_fetched(&s, &session);
        settle(400).await;

        let expected: Vec<String> = neighbors(&s, crate::address::DEFAULT_MAX_ORDER)
            .into_iter()
            .take(10)
            .map(|n| n.to_url())
            .collect();
        let actual: Vec<String> = h.fetcher.calls().into_iter().map(|r| r.url).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_ignores_repeat_seed() {
        let h = harness();
        let session = CancellationToken::new();

        assert_eq!(h.scheduler.on_fetched(&seed(40), &session), SeedOutcome::Queued);
        settle(500).await;
        assert_eq!(
            h.scheduler.on_fetched(&seed(40), &session),
            SeedOutcome::CooledDown
        );
        assert_eq!(h.metrics.snapshot().seeds_cooled_down, 1);

        settle(1_000).await;
        assert_eq!(h.metrics.snapshot().prefetch_batches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_accepted_again_after_cooldown() {
        let h = harness();
        let session = CancellationToken::new();

        h.scheduler.on_fetched(&seed(40), &session);
        settle(1_001).await;

        assert_eq!(h.scheduler.on_fetched(&seed(40), &session), SeedOutcome::Queued);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeds_within_window_share_one_batch() {
        let h = harness();
        let session = CancellationToken::new();

        h.scheduler.on_fetched(&seed(40), &session);
        settle(100).await;
        h.scheduler.on_fetched(&seed(4000), &session);
        settle(100).await;
        h.scheduler.on_fetched(&seed(8000), &session);

        assert_eq!(h.scheduler.pending_seeds(), 3);
        settle(400).await;

        assert_eq!(h.metrics.snapshot().prefetch_batches, 1);
        assert_eq!(h.fetcher.call_count(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_after_drain_arms_new_timer() {
        let h = harness();
        let session = CancellationToken::new();

        h.scheduler.on_fetched(&seed(40), &session);
        settle(400).await;
        h.scheduler.on_fetched(&seed(4000), &session);

        assert!(h.scheduler.timer_armed());
        settle(400).await;
        assert_eq!(h.metrics.snapshot().prefetch_batches, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_timer() {
        let h = harness();
        let session = CancellationToken::new();

        h.scheduler.on_fetched(&seed(40), &session);
        session.cancel();
        assert_eq!(h.scheduler.clear(), 1);

        settle(1_000).await;
        assert_eq!(h.fetcher.call_count(), 0);
        assert!(!h.scheduler.timer_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_session_is_ignored() {
        let h = harness();
        let session = CancellationToken::new();
        session.cancel();

        assert_eq!(
            h.scheduler.on_fetched(&seed(40), &session),
            SeedOutcome::Ignored
        );
        assert_eq!(h.scheduler.pending_seeds(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_scheduler_ignores_seeds() {
        let h = harness_with(PrefetchConfig::disabled(), ScriptedFetcher::new());
        let session = CancellationToken::new();

        assert_eq!(
            h.scheduler.on_fetched(&seed(40), &session),
            SeedOutcome::Ignored
        );
        settle(1_000).await;
        assert_eq!(h.fetcher.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_neighbors_skipped() {
        let h = harness();
        let session = CancellationToken::new();
        let s = seed(40);
        let first = neighbors(&s, 15)[0].to_url();
        h.store
            .store_response(&first, &crate::fetch::tile_response("image/jpeg", &[1]));

        h.scheduler.on_fetched(&s, &session);
        settle(400).await;

        assert_eq!(h.fetcher.calls_for(&first), 0);
        assert_eq!(h.fetcher.call_count(), 9);
        assert_eq!(h.metrics.snapshot().prefetch_skipped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_neighbors_skipped() {
        let h = harness();
        let session = CancellationToken::new();
        let s = seed(40);
        let first = neighbors(&s, 15)[0].to_url();
        let _guard = h.registry.try_begin(&first);

        h.scheduler.on_fetched(&s, &session);
        settle(400).await;

        assert_eq!(h.fetcher.calls_for(&first), 0);
        assert_eq!(h.fetcher.call_count(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_swallowed() {
        let h = harness_with(
            PrefetchConfig::default(),
            ScriptedFetcher::with_default(Err(FetchError::Transport("down".to_string()))),
        );
        let session = CancellationToken::new();

        h.scheduler.on_fetched(&seed(40), &session);
        settle(400).await;

        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.prefetch_issued, 10);
        assert_eq!(snapshot.prefetch_failed, 10);
        assert_eq!(h.store.len(), 0);
        assert_eq!(h.registry.in_flight_count(), 0);
    }

    /// Clock that cancels a session on its `n`th reading.
    struct CancellingClock {
        session: CancellationToken,
        cancel_on: usize,
        reads: std::sync::atomic::AtomicUsize,
    }

    impl Clock for CancellingClock {
        fn now(&self) -> Instant {
            let read = self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if read == self.cancel_on {
                self.session.cancel();
            }
            SystemClock.now()
        }

        fn sleep(&self, duration: Duration) -> futures::future::BoxFuture<'static, ()> {
            SystemClock.sleep(duration)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_while_probing_cache_issues_no_fetch() {
        let session = CancellationToken::new();
        // Readings: seed cooldown, batch drain, first neighbor's cache probe.
        let clock: Arc<dyn Clock> = Arc::new(CancellingClock {
            session: session.clone(),
            cancel_on: 3,
            reads: std::sync::atomic::AtomicUsize::new(0),
        });
        let fetcher = Arc::new(ScriptedFetcher::new());
        let store = Arc::new(TileCacheStore::new(
            CacheStoreConfig::default(),
            Arc::clone(&clock),
        ));
        let registry = Arc::new(InFlightRegistry::new());
        let metrics = Arc::new(EngineMetrics::new());
        let scheduler = Arc::new(PrefetchScheduler::new(
            PrefetchConfig::default(),
            store,
            Arc::clone(&registry),
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            clock,
            Arc::clone(&metrics),
        ));

        assert_eq!(scheduler.on_fetched(&seed(40), &session), SeedOutcome::Queued);
        settle(400).await;

        assert!(session.is_cancelled());
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(metrics.snapshot().prefetch_issued, 0);
        assert_eq!(registry.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_mid_batch_stops_remaining_fetches() {
        let h = harness_with(PrefetchConfig::default(), ScriptedFetcher::new().held());
        let session = CancellationToken::new();

        h.scheduler.on_fetched(&seed(40), &session);
        settle(400).await;
        assert_eq!(h.fetcher.call_count(), 1, "first neighbor is held open");

        session.cancel();
        h.scheduler.clear();
        h.fetcher.release(10);
        settle(100).await;

        assert_eq!(h.fetcher.call_count(), 1);
        assert_eq!(h.store.len(), 0, "late result not stored");
        assert_eq!(h.metrics.snapshot().late_results_discarded, 1);
        assert_eq!(h.registry.in_flight_count(), 0);
    }
}
