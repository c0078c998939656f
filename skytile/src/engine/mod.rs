//! Fetch interceptor facade.
//!
//! # Request flow
//!
//! ```text
//! handle(request)
//!     │
//!     ├─ inactive, non-GET or not a tile ───────────────► Fetcher (pass-through)
//!     │
//!     ├─ fresh in cache ──────────────────────────────────► cached copy + hit marker
//!     │
//!     └─ miss ─► InFlightRegistry
//!                  ├─ joined ─► wait for leader's result
//!                  └─ begun  ─► Fetcher ─► admit? ─► store ─► PrefetchScheduler
//!                                  │
//!                                  └─ release in-flight, share result
//! ```
//!
//! The engine owns no global state; every instance has its own cache,
//! registry and scheduler.

mod config;
mod interceptor;
mod lifecycle;

pub use config::EngineConfig;
pub use interceptor::{DebugSnapshot, Engine};
