//! Engine telemetry for observability and tests.
//!
//! Lock-free atomic counters are bumped from the request path and the
//! prefetch tasks; a [`TelemetrySnapshot`] is a point-in-time copy suitable
//! for display or assertions.
//!
//! # Architecture
//!
//! ```text
//! Engine / Prefetcher ─────► EngineMetrics ─────► TelemetrySnapshot ─────► CLI, logs
//!                          (atomic counters)     (point-in-time copy)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use skytile::telemetry::EngineMetrics;
//!
//! let metrics = EngineMetrics::new();
//! metrics.cache_hit();
//! metrics.origin_fetch_completed(3);
//!
//! let snapshot = metrics.snapshot();
//! println!("Hit rate: {:.1}%", snapshot.cache_hit_rate() * 100.0);
//! ```

mod metrics;
mod snapshot;

pub use metrics::EngineMetrics;
pub use snapshot::{format_bytes, TelemetrySnapshot};
