//! Time source abstraction.
//!
//! TTL expiry, prefetch cooldown and the debounce timer all read time
//! through [`Clock`] so tests can drive them deterministically.
//!
//! - [`SystemClock`] follows tokio's clock. Under `#[tokio::test(start_paused = true)]`
//!   it becomes virtual time advanced with `tokio::time::advance`.
//! - [`ManualClock`] is advanced explicitly and needs no runtime for `now()`,
//!   which suits synchronous cache-store tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::watch;

/// Monotonic time source with a sleep primitive.
pub trait Clock: Send + Sync {
    /// Current monotonic time.
    fn now(&self) -> Instant;

    /// Future that completes once `duration` has elapsed on this clock.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Production clock backed by tokio's timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Clock that only moves when [`ManualClock::advance`] is called.
///
/// Pending sleeps complete as soon as an advance carries the clock past
/// their deadline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    /// Elapsed time in nanoseconds since `base`.
    elapsed: Arc<watch::Sender<u64>>,
}

impl ManualClock {
    /// Create a clock starting at the current instant.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            base: Instant::now(),
            elapsed: Arc::new(tx),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let step = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.elapsed
            .send_modify(|elapsed| *elapsed = elapsed.saturating_add(step));
    }

    /// Time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(*self.elapsed.borrow())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        let mut rx = self.elapsed.subscribe();
        let step = duration.as_nanos().min(u64::MAX as u128) as u64;
        let deadline = rx.borrow().saturating_add(step);
        Box::pin(async move {
            loop {
                if *rx.borrow_and_update() >= deadline {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Clock dropped; the deadline can never be reached.
                    futures::future::pending::<()>().await;
                }
            }
        })
    }
}
