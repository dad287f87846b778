//! Resilient envelope around the remote content API.
//!
//! Every remote call flows through the same gauntlet: circuit breaker
//! check, rate-limiter admission, the attempt itself, outcome
//! classification and reporting, then backoff-and-retry while the budget
//! lasts. The retry loop is an explicit attempt counter + classification
//! state machine, so limits and circuit interactions stay auditable.
//!
//! Without an API key the client degrades to a heuristic fallback that
//! never touches the network — and therefore never consumes rate-limiter
//! slots or circuit state.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::backoff::BackoffPolicy;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerStats};
use crate::config::ResilienceConfig;
use crate::error::ApiError;
use crate::fallback;
use crate::models::{AttemptOutcome, DiscoveryOutcome, DiscoveryResult, RequestAttempt};
use crate::rate_limit::RateLimiter;
use crate::traits::ContentApi;
use crate::urlutil;

/// Client wrapping a [`ContentApi`] with retry, backoff, rate limiting,
/// and circuit breaking. One instance per target API; concurrent workers
/// share it via `Clone` and observe serialized limiter/breaker state.
#[derive(Clone)]
pub struct ResilientClient<A> {
    api: Option<A>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    backoff: BackoffPolicy,
    /// Bounds concurrent in-flight remote calls.
    permits: Arc<Semaphore>,
}

impl<A: ContentApi> ResilientClient<A> {
    /// Client backed by a real API (credential present).
    pub fn new(api: A, config: &ResilienceConfig) -> Self {
        Self::build(Some(api), config)
    }

    /// Client in fallback mode (credential absent): discovery guesses
    /// common paths, scrapes return placeholders, no network calls.
    pub fn without_api(config: &ResilienceConfig) -> Self {
        Self::build(None, config)
    }

    fn build(api: Option<A>, config: &ResilienceConfig) -> Self {
        if api.is_none() {
            tracing::warn!("No API credential configured; running in fallback mode");
        }
        Self {
            api,
            limiter: RateLimiter::new(config.requests_per_minute),
            breaker: CircuitBreaker::new("content-api", config),
            backoff: BackoffPolicy::new(config),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    /// Whether this client is running without a credential.
    pub fn fallback_mode(&self) -> bool {
        self.api.is_none()
    }

    /// Breaker snapshot for observability.
    pub fn breaker_stats(&self) -> CircuitBreakerStats {
        self.breaker.stats()
    }

    /// Requests currently counted by the rate limiter.
    pub fn requests_in_window(&self) -> usize {
        self.limiter.in_window()
    }

    /// Discover URLs for a domain.
    ///
    /// The result is post-processed the way the report expects it:
    /// discovered URLs are normalized, restricted to the target's domain,
    /// deduplicated preserving order, and capped at `limit`. Failure is
    /// data (`DiscoveryOutcome`), not an escaping error.
    pub async fn discover(&self, domain: &str, limit: usize) -> DiscoveryResult {
        let base = match urlutil::normalize(domain) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(%domain, error = %e, "Discovery target rejected");
                return DiscoveryResult::failed(domain, e.to_string());
            }
        };
        let domain_name = urlutil::domain_of(&base).unwrap_or_else(|| domain.to_string());

        let Some(api) = &self.api else {
            tracing::info!(domain = %domain_name, "Fallback discovery from common path patterns");
            return DiscoveryResult {
                domain: domain_name,
                urls: fallback::discovery_urls(&base, limit),
                outcome: DiscoveryOutcome::Fallback,
            };
        };

        let result = self
            .call_with_retry(base.as_str(), || api.discover(base.as_str(), limit))
            .await;

        match result {
            Ok(raw_urls) => {
                let urls = Self::post_process(raw_urls, &base, limit);
                tracing::info!(domain = %domain_name, count = urls.len(), "Discovery complete");
                DiscoveryResult {
                    domain: domain_name,
                    urls,
                    outcome: DiscoveryOutcome::Success,
                }
            }
            Err(ApiError::RateLimited) | Err(ApiError::UpstreamStatus { status: 429, .. }) => {
                // Past the retry budget and still throttled: degrade to
                // just the seed URL rather than failing the whole job.
                tracing::warn!(domain = %domain_name, "Discovery rate-limited past retry budget");
                DiscoveryResult {
                    domain: domain_name,
                    urls: vec![base.to_string()],
                    outcome: DiscoveryOutcome::RateLimited,
                }
            }
            Err(e) => {
                tracing::warn!(domain = %domain_name, error = %e, "Discovery failed");
                DiscoveryResult::failed(domain_name, e.to_string())
            }
        }
    }

    /// Scrape one URL to text content through the resilience envelope.
    pub async fn scrape(&self, url: &str) -> Result<String, ApiError> {
        let Some(api) = &self.api else {
            return Ok(fallback::scrape_placeholder(url));
        };
        self.call_with_retry(url, || api.fetch(url)).await
    }

    /// Normalize, same-domain filter, dedup, cap.
    fn post_process(raw_urls: Vec<String>, base: &url::Url, limit: usize) -> Vec<String> {
        let cleaned: Vec<String> = raw_urls
            .iter()
            .filter_map(|raw| urlutil::normalize(raw).ok())
            .filter(|url| urlutil::is_same_domain(url, base))
            .map(|url| url.to_string())
            .collect();
        let mut unique = urlutil::dedup_preserving_order(cleaned);
        unique.truncate(limit);
        unique
    }

    /// One remote operation through circuit → limiter → attempt →
    /// classify/report → backoff, until success or stop.
    async fn call_with_retry<T, F, Fut>(&self, target: &str, operation: F) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt: u32 = 1;
        loop {
            // Re-checked every iteration: the circuit may have opened due
            // to concurrent failures while this call was backing off.
            if let Err(retry_after) = self.breaker.try_acquire() {
                tracing::debug!(%target, ?retry_after, "Call rejected, circuit open");
                return Err(ApiError::CircuitOpen { retry_after });
            }

            // A rate wait is expected steady-state, not a failure.
            let waited = self.limiter.acquire().await;
            if !waited.is_zero() {
                tracing::debug!(%target, waited_ms = %waited.as_millis(), "Admitted after rate wait");
            }

            let permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| ApiError::Unclassified("concurrency gate closed".into()))?;
            let started_at = Utc::now();
            let result = operation().await;
            drop(permit);

            match result {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(error) => {
                    let class = error.classify();
                    self.breaker.record_failure(&error);

                    let record = RequestAttempt {
                        target: target.to_string(),
                        attempt,
                        started_at,
                        outcome: AttemptOutcome::Failed(class),
                    };
                    tracing::debug!(
                        target = %record.target,
                        attempt = record.attempt,
                        class = %class,
                        error = %error,
                        "Attempt failed"
                    );

                    match self.backoff.next_delay(attempt, class) {
                        Some(delay) => {
                            tracing::debug!(%target, attempt, delay_ms = %delay.as_millis(), "Backing off before retry");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => {
                            tracing::warn!(
                                %target,
                                attempts = attempt,
                                class = %class,
                                error = %error,
                                "Giving up after final attempt"
                            );
                            return Err(error);
                        }
                    }
                }
            }
        }
    }
}
