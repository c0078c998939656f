//! The request-facing engine.

use std::sync::Arc;

use tracing::{debug, info, trace};

use super::config::EngineConfig;
use super::lifecycle::{Activation, Deactivation, Lifecycle};
use crate::address::TileAddress;
use crate::cache::{CacheStats, TileCacheStore};
use crate::clock::{Clock, SystemClock};
use crate::coalesce::{
    BeginOutcome, CoalescedWaiter, InFlightGuard, InFlightRegistry, RegistryStats,
};
use crate::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, Method};
use crate::prefetch::PrefetchScheduler;
use crate::telemetry::{EngineMetrics, TelemetrySnapshot};

/// Point-in-time view of engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugSnapshot {
    /// Entries in the cache store, including any not yet swept.
    pub cache_size: usize,
    /// URLs currently being fetched from origin.
    pub in_flight_count: usize,
    /// Seeds waiting for the next prefetch batch.
    pub pending_seeds: usize,
    /// Whether at least one activation is held.
    pub active: bool,
}

/// Result of registering a cache miss with the in-flight registry.
enum Claim {
    /// Another leader stored the tile after our lookup missed.
    Cached(FetchResponse),
    /// This request performs the origin fetch.
    Leader(InFlightGuard),
    /// Another request is fetching; wait for its result.
    Follower(CoalescedWaiter),
}

/// Caching, coalescing and prefetching front for a tile [`Fetcher`].
///
/// Requests that are not `GET`s of recognised tile URLs, and every request
/// while the engine is inactive, go straight to the fetcher.
///
/// # Example
///
/// ```ignore
/// let engine = Engine::new(EngineConfig::default(), fetcher);
/// engine.activate();
/// let response = engine.handle(FetchRequest::get(url)).await?;
/// assert!(!response.is_cache_hit());
/// ```
pub struct Engine {
    config: EngineConfig,
    fetcher: Arc<dyn Fetcher>,
    store: Arc<TileCacheStore>,
    registry: Arc<InFlightRegistry>,
    scheduler: Arc<PrefetchScheduler>,
    metrics: Arc<EngineMetrics>,
    lifecycle: Lifecycle,
}

impl Engine {
    /// Create an inactive engine driven by tokio's clock.
    pub fn new(config: EngineConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_clock(config, fetcher, Arc::new(SystemClock))
    }

    /// Create an inactive engine with an explicit time source.
    ///
    /// # Arguments
    ///
    /// * `config` - Cache and prefetch settings
    /// * `fetcher` - Transport used for every origin request
    /// * `clock` - Time source for TTL, cooldown and debounce
    pub fn with_clock(
        config: EngineConfig,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let store = Arc::new(TileCacheStore::new(
            config.cache_config(),
            Arc::clone(&clock),
        ));
        let registry = Arc::new(InFlightRegistry::new());
        let scheduler = Arc::new(PrefetchScheduler::new(
            config.prefetch_config(),
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&fetcher),
            clock,
            Arc::clone(&metrics),
        ));

        Self {
            config,
            fetcher,
            store,
            registry,
            scheduler,
            metrics,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Take an activation. Returns the number of activations now held.
    ///
    /// Activations are reference counted; only the first one starts a
    /// session.
    pub fn activate(&self) -> usize {
        match self.lifecycle.activate() {
            Activation::Started => {
                info!(
                    ttl_ms = self.config.ttl.as_millis() as u64,
                    max_entries = self.config.max_entries,
                    prefetch = self.config.prefetch_enabled,
                    "Tile engine activated"
                );
                1
            }
            Activation::Shared(count) => {
                debug!(active = count, "Tile engine activation shared");
                count
            }
        }
    }

    /// Release an activation. Returns the number still held.
    ///
    /// Releasing the last one cancels the debounce timer, drops pending
    /// seeds and empties the cache. Outstanding fetches are not awaited;
    /// their results are returned to callers but not stored.
    pub fn deactivate(&self) -> usize {
        let outcome = self.lifecycle.deactivate(|| {
            let dropped_seeds = self.scheduler.clear();
            let dropped_entries = self.store.len();
            self.store.clear();
            info!(dropped_seeds, dropped_entries, "Tile engine deactivated");
        });

        match outcome {
            Deactivation::TornDown => 0,
            Deactivation::Released(count) => {
                debug!(active = count, "Tile engine activation released");
                count
            }
            Deactivation::NotActive => {
                debug!("Deactivate called on inactive tile engine");
                0
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.active_count() > 0
    }

    pub fn active_count(&self) -> usize {
        self.lifecycle.active_count()
    }

    /// Handle one request.
    ///
    /// Transport errors are returned unchanged and never retried. A
    /// response that fails admission is still returned; it is simply not
    /// cached.
    pub async fn handle(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let Some(session) = self.lifecycle.session() else {
            return self.pass_through(request).await;
        };

        if request.method != Method::Get {
            return self.pass_through(request).await;
        }

        let address = match TileAddress::parse(&request.url) {
            Ok(address) => address,
            Err(e) => {
                trace!(url = %request.url, reason = %e, "Not a tile request");
                return self.pass_through(request).await;
            }
        };
        let key = address.to_url();

        if let Some(entry) = self.store.get(&key) {
            self.metrics.cache_hit();
            debug!(url = %key, bytes = entry.body.len(), "Tile cache hit");
            return Ok(entry.to_response());
        }
        self.metrics.cache_miss();

        let guard = match self.claim(&key) {
            Claim::Cached(response) => return Ok(response),
            Claim::Leader(guard) => guard,
            Claim::Follower(waiter) => {
                self.metrics.request_coalesced();
                if let Some(result) = waiter.wait().await {
                    return result;
                }
                debug!(url = %key, "In-flight fetch abandoned, fetching directly");
                return self.pass_through(request).await;
            }
        };

        let result = self.fetcher.fetch(request).await;

        match &result {
            Ok(response) if session.is_cancelled() => {
                self.metrics.origin_fetch_completed(response.body.len() as u64);
                self.metrics.late_result_discarded();
                debug!(url = %key, "Tile fetched after teardown, not cached");
            }
            Ok(response) => {
                self.metrics
                    .origin_fetch_completed(response.body.len() as u64);
                let verdict = self.store.store_response(&key, response);
                if verdict.is_admitted() {
                    self.metrics.response_stored();
                    debug!(
                        url = %key,
                        order = address.order(),
                        pixel = address.pixel(),
                        bytes = response.body.len(),
                        "Tile fetched and cached"
                    );
                    self.scheduler.on_fetched(&address, &session);
                } else {
                    self.metrics.admission_rejected();
                    debug!(
                        url = %key,
                        status = response.status,
                        reason = verdict.as_str(),
                        "Tile response not cached"
                    );
                }
            }
            Err(e) => {
                self.metrics.origin_fetch_failed();
                debug!(url = %key, error = %e, "Tile fetch failed");
            }
        }

        guard.complete(result.clone());
        result
    }

    /// Become the leader for `key`, join the running fetch, or find that
    /// a leader finished between the cache miss and registration.
    fn claim(&self, key: &str) -> Claim {
        match self.registry.try_begin(key) {
            BeginOutcome::Joined(waiter) => Claim::Follower(waiter),
            BeginOutcome::Begun(guard) => {
                // Leaders store before releasing the key, so a released key
                // with a fresh entry means the fetch already happened.
                match self.store.get(key) {
                    Some(entry) => {
                        let response = entry.to_response();
                        guard.complete(Ok(response.clone()));
                        debug!(url = %key, "Tile cached while registering, no fetch needed");
                        Claim::Cached(response)
                    }
                    None => Claim::Leader(guard),
                }
            }
        }
    }

    async fn pass_through(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        self.metrics.pass_through();
        self.fetcher.fetch(request).await
    }

    /// Empty the cache without touching activation state.
    pub fn purge(&self) {
        let dropped = self.store.len();
        self.store.clear();
        info!(dropped, "Tile cache purged");
    }

    /// Current cache, in-flight and scheduler state.
    pub fn debug_snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            cache_size: self.store.len(),
            in_flight_count: self.registry.in_flight_count(),
            pending_seeds: self.scheduler.pending_seeds(),
            active: self.is_active(),
        }
    }

    /// Emit [`Engine::debug_snapshot`] at debug level.
    pub fn log_debug_state(&self) {
        let snapshot = self.debug_snapshot();
        debug!(
            cache_size = snapshot.cache_size,
            in_flight = snapshot.in_flight_count,
            pending_seeds = snapshot.pending_seeds,
            active = snapshot.active,
            "Tile engine state"
        );
    }

    /// Engine counters.
    pub fn metrics(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn registry_stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("state", &self.debug_snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{tile_response, ScriptedFetcher, CACHE_HIT_HEADER};
    use std::time::Duration;

    const TILE: &str = "https://example.org/hips/Norder8/Dir0/Npix123.jpg";

    fn engine_with(
        config: EngineConfig,
        fetcher: ScriptedFetcher,
    ) -> (Arc<Engine>, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(fetcher);
        let engine = Arc::new(Engine::new(
            config,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        ));
        (engine, fetcher)
    }

    fn quiet_engine() -> (Arc<Engine>, Arc<ScriptedFetcher>) {
        engine_with(
            EngineConfig::default().with_prefetch_enabled(false),
            ScriptedFetcher::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_engine_passes_through() {
        let (engine, fetcher) = quiet_engine();

        engine.handle(FetchRequest::get(TILE)).await.unwrap();
        engine.handle(FetchRequest::get(TILE)).await.unwrap();

        assert_eq!(fetcher.calls_for(TILE), 2);
        assert_eq!(engine.debug_snapshot().cache_size, 0);
        assert_eq!(engine.metrics().pass_throughs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_served_from_cache() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();

        let first = engine.handle(FetchRequest::get(TILE)).await.unwrap();
        let second = engine.handle(FetchRequest::get(TILE)).await.unwrap();

        assert!(!first.is_cache_hit());
        assert!(second.is_cache_hit());
        assert_eq!(second.headers.get(CACHE_HIT_HEADER), Some("HIT"));
        assert_eq!(first.body, second.body);
        assert_eq!(fetcher.calls_for(TILE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_canonical_dir_shares_cache_key() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();

        engine
            .handle(FetchRequest::get("https://example.org/hips/Norder8/Dir7/Npix123.jpg"))
            .await
            .unwrap();
        let response = engine.handle(FetchRequest::get(TILE)).await.unwrap();

        assert!(response.is_cache_hit());
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_get_passes_through() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();

        for _ in 0..2 {
            engine
                .handle(FetchRequest::with_method(TILE, Some("post")))
                .await
                .unwrap();
        }

        assert_eq!(fetcher.calls_for(TILE), 2);
        assert_eq!(engine.debug_snapshot().cache_size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lowercase_get_is_intercepted() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();

        engine
            .handle(FetchRequest::with_method(TILE, Some("get")))
            .await
            .unwrap();
        engine.handle(FetchRequest::get(TILE)).await.unwrap();

        assert_eq!(fetcher.calls_for(TILE), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_tile_passes_through() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();
        let url = "https://example.org/api/status";

        engine.handle(FetchRequest::get(url)).await.unwrap();
        engine.handle(FetchRequest::get(url)).await.unwrap();

        assert_eq!(fetcher.calls_for(url), 2);
        assert_eq!(engine.metrics().pass_throughs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_response_returned_not_cached() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();
        let mut not_found = tile_response("text/html", b"missing");
        not_found.status = 404;
        fetcher.respond(TILE, Ok(not_found));

        let response = engine.handle(FetchRequest::get(TILE)).await.unwrap();
        assert_eq!(response.status, 404);

        engine.handle(FetchRequest::get(TILE)).await.unwrap();
        assert_eq!(fetcher.calls_for(TILE), 2);
        assert_eq!(engine.metrics().admission_rejections, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_propagates_and_releases() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();
        fetcher.respond(TILE, Err(FetchError::Timeout(TILE.to_string())));

        let result = engine.handle(FetchRequest::get(TILE)).await;

        assert_eq!(result, Err(FetchError::Timeout(TILE.to_string())));
        assert_eq!(engine.debug_snapshot().in_flight_count, 0);
        assert_eq!(engine.metrics().origin_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_refetches() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();

        engine.handle(FetchRequest::get(TILE)).await.unwrap();
        tokio::time::advance(Duration::from_millis(90_000)).await;
        assert!(engine
            .handle(FetchRequest::get(TILE))
            .await
            .unwrap()
            .is_cache_hit());

        tokio::time::advance(Duration::from_millis(1)).await;
        let response = engine.handle(FetchRequest::get(TILE)).await.unwrap();

        assert!(!response.is_cache_hit());
        assert_eq!(fetcher.calls_for(TILE), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_empties_cache_only() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();
        engine.handle(FetchRequest::get(TILE)).await.unwrap();

        engine.purge();

        assert!(engine.is_active());
        assert_eq!(engine.debug_snapshot().cache_size, 0);
        engine.handle(FetchRequest::get(TILE)).await.unwrap();
        assert_eq!(fetcher.calls_for(TILE), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refcounted_activation() {
        let (engine, _fetcher) = quiet_engine();

        assert_eq!(engine.activate(), 1);
        assert_eq!(engine.activate(), 2);
        engine.handle(FetchRequest::get(TILE)).await.unwrap();

        assert_eq!(engine.deactivate(), 1);
        assert!(engine.is_active());
        assert_eq!(engine.debug_snapshot().cache_size, 1);

        assert_eq!(engine.deactivate(), 0);
        assert!(!engine.is_active());
        assert_eq!(engine.debug_snapshot().cache_size, 0);

        assert_eq!(engine.deactivate(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesced_requests_share_result() {
        let (engine, fetcher) = engine_with(
            EngineConfig::default().with_prefetch_enabled(false),
            ScriptedFetcher::new().held(),
        );
        engine.activate();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.handle(FetchRequest::get(TILE)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(engine.debug_snapshot().in_flight_count, 1);
        fetcher.release(1);

        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            assert_eq!(response.body.as_ref(), &[1, 2, 3]);
        }
        assert_eq!(fetcher.calls_for(TILE), 1);
        assert_eq!(engine.metrics().coalesced, 4);
        assert_eq!(engine.debug_snapshot().in_flight_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_after_teardown_not_cached() {
        let (engine, fetcher) =
            engine_with(EngineConfig::default(), ScriptedFetcher::new().held());
        engine.activate();

        let e = Arc::clone(&engine);
        let handle = tokio::spawn(async move { e.handle(FetchRequest::get(TILE)).await });
        tokio::time::sleep(Duration::from_millis(1)).await;

        engine.deactivate();
        engine.activate();
        fetcher.release(1);

        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(engine.debug_snapshot().cache_size, 0);
        assert_eq!(engine.debug_snapshot().pending_seeds, 0);
        assert_eq!(engine.metrics().late_results_discarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_fetch_seeds_prefetch() {
        let (engine, fetcher) = engine_with(EngineConfig::default(), ScriptedFetcher::new());
        engine.activate();

        engine.handle(FetchRequest::get(TILE)).await.unwrap();
        assert_eq!(engine.debug_snapshot().pending_seeds, 1);

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(fetcher.call_count(), 11);
        assert_eq!(engine.debug_snapshot().cache_size, 11);
        assert_eq!(engine.metrics().prefetch_stored, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_after_leader_finished_uses_cache() {
        let (engine, fetcher) = quiet_engine();
        engine.activate();
        let key = TileAddress::parse(TILE).unwrap().to_url();

        // A leader stored the tile and released the key after this
        // request's own cache lookup missed.
        engine
            .store
            .store_response(&key, &tile_response("image/jpeg", &[9, 9]));

        match engine.claim(&key) {
            Claim::Cached(response) => {
                assert!(response.is_cache_hit());
                assert_eq!(response.body.as_ref(), &[9, 9]);
            }
            Claim::Leader(_) => panic!("expected the cached tile"),
            Claim::Follower(_) => panic!("expected the cached tile"),
        }
        assert_eq!(engine.debug_snapshot().in_flight_count, 0);
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_uncached_becomes_leader() {
        let (engine, _fetcher) = quiet_engine();
        engine.activate();
        let key = TileAddress::parse(TILE).unwrap().to_url();

        let guard = match engine.claim(&key) {
            Claim::Leader(guard) => guard,
            _ => panic!("expected to lead the fetch"),
        };
        assert!(matches!(engine.claim(&key), Claim::Follower(_)));

        drop(guard);
        assert_eq!(engine.debug_snapshot().in_flight_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_misses_fetch_once() {
        for round in 0..200 {
            let (engine, fetcher) = quiet_engine();
            engine.activate();
            let url = format!("https://example.org/hips/Norder8/Dir0/Npix{}.jpg", round);

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let engine = Arc::clone(&engine);
                    let url = url.clone();
                    tokio::spawn(async move { engine.handle(FetchRequest::get(url)).await })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.await.unwrap().unwrap().status, 200);
            }

            assert_eq!(fetcher.calls_for(&url), 1, "round {}", round);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_snapshot_and_log() {
        let (engine, _fetcher) = quiet_engine();
        assert_eq!(engine.debug_snapshot(), DebugSnapshot::default());

        engine.activate();
        engine.handle(FetchRequest::get(TILE)).await.unwrap();
        engine.log_debug_state();

        let snapshot = engine.debug_snapshot();
        assert!(snapshot.active);
        assert_eq!(snapshot.cache_size, 1);
        assert_eq!(snapshot.in_flight_count, 0);
    }
}
