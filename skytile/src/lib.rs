//! Skytile - tile cache and predictive prefetch for HiPS sky surveys
//!
//! This library sits between an image viewer and a HiPS tile server. It
//! serves repeat tile requests from a bounded in-memory cache, shares one
//! origin fetch among concurrent requests for the same tile, and prefetches
//! neighboring tiles in the background so panning and zooming stay fast.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────────────────────────────────┐
//!  FetchRequest ─────► │ Engine (interceptor)                     │ ─────► Fetcher
//!                      │   address ─ cache ─ coalesce ─ prefetch   │      (reqwest)
//!                      └──────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use skytile::{Engine, EngineConfig, FetchRequest, ReqwestFetcher};
//!
//! let engine = Engine::new(EngineConfig::default(), Arc::new(ReqwestFetcher::new()?));
//! engine.activate();
//!
//! let url = "https://alasky.example/DSS2/Norder3/Dir0/Npix42.jpg";
//! let first = engine.handle(FetchRequest::get(url)).await?;
//! let second = engine.handle(FetchRequest::get(url)).await?;
//! assert!(second.is_cache_hit());
//! ```

pub mod address;
pub mod cache;
pub mod clock;
pub mod coalesce;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod prefetch;
pub mod telemetry;

pub use address::{AddressError, TileAddress, TileExtension};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DebugSnapshot, Engine, EngineConfig};
pub use fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, ReqwestFetcher};
pub use telemetry::TelemetrySnapshot;
