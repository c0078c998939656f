//! Reference-counted activation.
//!
//! Each activation from zero opens a session identified by a fresh
//! [`CancellationToken`]. Work started during a session carries that token;
//! the last matching deactivation cancels it and runs the teardown.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Result of [`Lifecycle::activate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Activation {
    /// First activation; a new session began.
    Started,
    /// Joined the running session. Carries the new count.
    Shared(usize),
}

/// Result of [`Lifecycle::deactivate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deactivation {
    /// The last activation was released and the session torn down.
    TornDown,
    /// Other activations remain. Carries the remaining count.
    Released(usize),
    /// The engine was not active.
    NotActive,
}

#[derive(Debug, Default)]
struct LifecycleState {
    active_count: usize,
    session: Option<CancellationToken>,
}

#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn activate(&self) -> Activation {
        let mut state = self.state.lock();
        state.active_count += 1;
        if state.active_count == 1 {
            state.session = Some(CancellationToken::new());
            Activation::Started
        } else {
            Activation::Shared(state.active_count)
        }
    }

    /// Release one activation.
    ///
    /// On the last release the session token is cancelled and `teardown`
    /// runs while the lifecycle lock is held, so a concurrent `activate`
    /// cannot interleave with it.
    pub(crate) fn deactivate(&self, teardown: impl FnOnce()) -> Deactivation {
        let mut state = self.state.lock();
        if state.active_count == 0 {
            return Deactivation::NotActive;
        }

        state.active_count -= 1;
        if state.active_count > 0 {
            return Deactivation::Released(state.active_count);
        }

        if let Some(session) = state.session.take() {
            session.cancel();
        }
        teardown();
        Deactivation::TornDown
    }

    /// Token of the running session, if any.
    pub(crate) fn session(&self) -> Option<CancellationToken> {
        self.state.lock().session.clone()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.state.lock().active_count
    }
}
