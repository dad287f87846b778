use std::future::Future;

use crate::error::ApiError;

/// The two primitive remote operations of the content-discovery/scraping
/// API. Implementations live in the HTTP client layer; the core only sees
/// this contract.
///
/// Failures must arrive as classified [`ApiError`]s (status codes mapped
/// to `RateLimited`/`UpstreamStatus`, transport failures to
/// `Timeout`/`Network`) so the retry loop and circuit breaker can act on
/// them.
pub trait ContentApi: Send + Sync + Clone {
    /// Discover URLs on a site, up to `limit`.
    fn discover(
        &self,
        domain: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<String>, ApiError>> + Send;

    /// Fetch one URL's content as markdown-ish text.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, ApiError>> + Send;
}
