//! Fetch tiles through an activated engine.
//!
//! Useful for watching the cache and prefetcher against a live tile server:
//! the second round of a `--repeat 2` run should be all cache hits, and
//! the telemetry printed after `--settle-ms` shows what prefetch did.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use skytile::config::ConfigFile;
use skytile::telemetry::format_bytes;
use skytile::{Engine, FetchRequest, ReqwestFetcher, TileAddress};
use tracing::info;

use crate::error::CliError;

/// Arguments for the `fetch` subcommand.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// URLs to fetch, in order
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Number of rounds over the URL list
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Time to wait for background prefetch before reporting, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    pub settle_ms: u64,
}

/// One completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchLine {
    pub round: u32,
    pub url: String,
    pub status: u16,
    pub bytes: usize,
    pub marker: CacheMarker,
}

/// How the engine treated a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMarker {
    Hit,
    Miss,
    /// Not a tile URL; forwarded untouched.
    Bypass,
}

impl CacheMarker {
    fn as_str(&self) -> &'static str {
        match self {
            CacheMarker::Hit => "HIT",
            CacheMarker::Miss => "MISS",
            CacheMarker::Bypass => "-",
        }
    }
}

/// Run the fetch subcommand.
pub fn run(args: FetchArgs, config: &ConfigFile) -> Result<(), CliError> {
    if args.repeat == 0 {
        return Err(CliError::Config("--repeat must be at least 1".to_string()));
    }

    let runtime = tokio::runtime::Runtime::new().map_err(CliError::Runtime)?;
    let fetcher = ReqwestFetcher::new().map_err(|error| CliError::Fetch {
        url: args.urls[0].clone(),
        error,
    })?;
    let engine = Engine::new(config.engine_config(), Arc::new(fetcher));

    runtime.block_on(async {
        engine.activate();

        let lines = fetch_rounds(&engine, &args.urls, args.repeat).await;
        if let Ok(lines) = &lines {
            for line in lines {
                println!(
                    "[{}] {} {:>10} {:<4} {}",
                    line.round,
                    line.status,
                    format_bytes(line.bytes as u64),
                    line.marker.as_str(),
                    line.url
                );
            }

            info!(settle_ms = args.settle_ms, "Waiting for background prefetch");
            tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;

            let state = engine.debug_snapshot();
            println!();
            println!(
                "Engine: {} cached, {} in flight, {} pending seeds",
                state.cache_size, state.in_flight_count, state.pending_seeds
            );
            println!();
            print!("{}", engine.metrics());
        }

        engine.deactivate();
        lines.map(|_| ())
    })
}

/// Fetch every URL `repeat` times, in order.
///
/// Stops at the first transport failure.
pub async fn fetch_rounds(
    engine: &Engine,
    urls: &[String],
    repeat: u32,
) -> Result<Vec<FetchLine>, CliError> {
    let mut lines = Vec::with_capacity(urls.len() * repeat as usize);

    for round in 1..=repeat {
        for url in urls {
            let response = engine
                .handle(FetchRequest::get(url.as_str()))
                .await
                .map_err(|error| CliError::Fetch {
                    url: url.clone(),
                    error,
                })?;

            let marker = if response.is_cache_hit() {
                CacheMarker::Hit
            } else if TileAddress::parse(url).is_ok() {
                CacheMarker::Miss
            } else {
                CacheMarker::Bypass
            };

            lines.push(FetchLine {
                round,
                url: url.clone(),
                status: response.status,
                bytes: response.body.len(),
                marker,
            });
        }
    }

    Ok(lines)
}
