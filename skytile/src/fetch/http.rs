//! Tile transport abstraction for testability.

use futures::future::BoxFuture;

use super::types::{FetchError, FetchRequest, FetchResponse, Headers};

/// Default request timeout for the reqwest transport.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent by the reqwest transport.
const DEFAULT_USER_AGENT: &str = concat!("skytile/", env!("CARGO_PKG_VERSION"));

/// Asynchronous transport that performs tile requests.
///
/// This abstraction allows the engine to be wired to any HTTP stack and
/// lets tests substitute a scripted transport. Implementations may be
/// called concurrently from many tasks.
///
/// Returns a boxed future so the engine can hold an `Arc<dyn Fetcher>`.
pub trait Fetcher: Send + Sync {
    /// Perform a request.
    ///
    /// Non-2xx statuses are responses, not errors; `Err` is reserved for
    /// requests that produced no response at all.
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<FetchResponse, FetchError>>;
}

/// Real transport implementation using reqwest.
///
/// Transport hints are ignored: reqwest has no HTTP cache and never sends
/// ambient credentials.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            // Tiles come in bursts from a handful of hosts
            .pool_max_idle_per_host(32)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, Result<FetchResponse, FetchError>> {
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
                .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.url, e)))?;

            let response = self
                .client
                .request(method, &request.url)
                .send()
                .await
                .map_err(|e| map_reqwest_error(&request.url, e))?;

            let status = response.status();
            let headers = Headers::from(response.headers().clone());

            let body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Body(format!("{}: {}", request.url, e)))?;

            Ok(FetchResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                headers,
                body,
                opaque: false,
            })
        })
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else if e.is_builder() {
        FetchError::InvalidUrl(format!("{}: {}", url, e))
    } else {
        FetchError::Transport(format!("{}: {}", url, e))
    }
}
