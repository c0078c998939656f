//! In-flight registry with result sharing.
//!
//! Prevents duplicate origin fetches. When several requests for the same
//! tile URL arrive while a fetch is outstanding, only the first one talks
//! to the network; every later one waits and receives the same result.
//!
//! # Architecture
//!
//! ```text
//! handle(A) ─┐
//!            │                               Fetcher
//! handle(B) ─┼──► InFlightRegistry ────────► (one call)
//!            │        │                          │
//! handle(C) ─┘        │                          │
//!                     ▼                          ▼
//!               [B, C subscribe]        InFlightGuard::complete
//!                     ◄─────── broadcast ────────┘
//! ```
//!
//! # Implementation
//!
//! A `DashMap<String, broadcast::Sender<_>>` maps each in-flight URL to the
//! channel its result will be published on. `try_begin` uses the entry API,
//! so check-and-insert is a single atomic step per key.
//!
//! The leader receives an [`InFlightGuard`]. The key is removed exactly once,
//! either when the guard publishes a result or when it is dropped without
//! one (error path, panic, cancelled future). In the latter case waiters see
//! a closed channel and fall back to their own pass-through fetch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::fetch::{FetchError, FetchResponse};

/// Result published to coalesced waiters.
pub type SharedResult = Result<FetchResponse, FetchError>;

/// One result is ever sent per channel.
const CHANNEL_CAPACITY: usize = 1;

/// Counters for monitoring coalescing effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total `try_begin` calls
    pub total_requests: u64,
    /// Requests that joined an existing fetch
    pub coalesced_requests: u64,
    /// Requests that started a new fetch
    pub new_requests: u64,
}

impl RegistryStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    coalesced: AtomicU64,
    new: AtomicU64,
}

/// Tracks URLs currently being fetched from origin.
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    in_flight: Arc<DashMap<String, broadcast::Sender<SharedResult>>>,
    counters: Counters,
}

/// Outcome of [`InFlightRegistry::try_begin`].
#[derive(Debug)]
pub enum BeginOutcome {
    /// No fetch was running; the caller must perform it.
    Begun(InFlightGuard),
    /// A fetch is already running; wait for its result.
    Joined(CoalescedWaiter),
}

impl BeginOutcome {
    pub fn is_begun(&self) -> bool {
        matches!(self, BeginOutcome::Begun(_))
    }
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetch for `url`, or join the one already running.
    ///
    /// Two concurrent callers for the same URL never both get
    /// [`BeginOutcome::Begun`].
    pub fn try_begin(&self, url: &str) -> BeginOutcome {
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        match self.in_flight.entry(url.to_string()) {
            Entry::Occupied(occupied) => {
                let rx = occupied.get().subscribe();
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(url = %url, "Joining in-flight fetch");
                BeginOutcome::Joined(CoalescedWaiter {
                    url: url.to_string(),
                    rx,
                })
            }
            Entry::Vacant(vacant) => {
                let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
                vacant.insert(tx);
                self.counters.new.fetch_add(1, Ordering::Relaxed);
                trace!(url = %url, "Registered in-flight fetch");
                BeginOutcome::Begun(InFlightGuard {
                    url: url.to_string(),
                    in_flight: Arc::clone(&self.in_flight),
                    released: false,
                })
            }
        }
    }

    /// Whether a fetch for `url` is currently running.
    pub fn contains(&self, url: &str) -> bool {
        self.in_flight.contains_key(url)
    }

    /// Number of URLs currently being fetched.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_requests: self.counters.total.load(Ordering::Relaxed),
            coalesced_requests: self.counters.coalesced.load(Ordering::Relaxed),
            new_requests: self.counters.new.load(Ordering::Relaxed),
        }
    }
}

/// Ownership of one in-flight fetch.
///
/// Dropping the guard without calling [`InFlightGuard::complete`] still
/// releases the URL.
#[derive(Debug)]
pub struct InFlightGuard {
    url: String,
    in_flight: Arc<DashMap<String, broadcast::Sender<SharedResult>>>,
    released: bool,
}

impl InFlightGuard {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Release the URL and publish `result` to every waiter.
    ///
    /// Returns the number of waiters that were subscribed.
    pub fn complete(mut self, result: SharedResult) -> usize {
        // Remove before sending: anyone arriving afterwards starts a fresh
        // fetch instead of subscribing to a channel that already fired.
        let sender = self.release();
        let Some(sender) = sender else {
            return 0;
        };

        let waiters = sender.receiver_count();
        if waiters > 0 {
            let _ = sender.send(result);
            debug!(url = %self.url, waiters, "Shared fetch result with coalesced waiters");
        }
        waiters
    }

    fn release(&mut self) -> Option<broadcast::Sender<SharedResult>> {
        if self.released {
            return None;
        }
        self.released = true;
        self.in_flight.remove(&self.url).map(|(_, tx)| tx)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.release().is_some() {
            trace!(url = %self.url, "In-flight fetch released without result");
        }
    }
}

/// Handle for a request that joined an existing fetch.
#[derive(Debug)]
pub struct CoalescedWaiter {
    url: String,
    rx: broadcast::Receiver<SharedResult>,
}

impl CoalescedWaiter {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the leader's result.
    ///
    /// Returns `None` if the leader went away without publishing one; the
    /// caller should then fetch on its own.
    pub async fn wait(mut self) -> Option<SharedResult> {
        self.rx.recv().await.ok()
    }
}
