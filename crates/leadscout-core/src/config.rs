use std::time::Duration;

/// Tuning for the resilient client: rate ceiling, retry budget, backoff
/// shape, and circuit breaker thresholds.
///
/// One instance per target API. Defaults match the upstream service's
/// published limits for a free-tier key.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Rate ceiling over a trailing 60-second window.
    pub requests_per_minute: u32,

    /// Maximum retries after the initial attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff (doubles per attempt).
    pub base_delay: Duration,

    /// Cap applied to the computed delay before jitter.
    pub max_delay: Duration,

    /// Failures within `failure_window` that open the circuit.
    pub failure_threshold: u32,

    /// Sliding window over which breaker failures are counted.
    pub failure_window: Duration,

    /// How long the circuit stays open before probing.
    pub cooldown: Duration,

    /// Ceiling on concurrent in-flight remote calls.
    pub max_concurrency: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 30,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            failure_threshold: 5,
            failure_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
            max_concurrency: 3,
        }
    }
}

impl ResilienceConfig {
    pub fn with_requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = rpm;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_breaker(mut self, threshold: u32, window: Duration, cooldown: Duration) -> Self {
        self.failure_threshold = threshold;
        self.failure_window = window;
        self.cooldown = cooldown;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }
}

/// Tuning for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum URLs requested from discovery.
    pub max_discovery_urls: usize,

    /// Top-K filter size: how many scored URLs get scraped.
    pub top_k: usize,

    /// Overall deadline for one run. `None` means no deadline.
    /// On expiry, in-flight scrapes are abandoned and completed results
    /// are still included in the aggregate.
    pub deadline: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_discovery_urls: 50,
            top_k: 7,
            deadline: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_max_discovery_urls(mut self, limit: usize) -> Self {
        self.max_discovery_urls = limit;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = ResilienceConfig::default();
        assert_eq!(config.requests_per_minute, 30);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.failure_window, config.cooldown);
        assert_eq!(config.max_concurrency, 3);
    }

    #[test]
    fn builders_override_fields() {
        let config = ResilienceConfig::default()
            .with_requests_per_minute(10)
            .with_max_retries(1)
            .with_backoff(Duration::from_millis(10), Duration::from_millis(80))
            .with_breaker(2, Duration::from_secs(5), Duration::from_secs(1))
            .with_max_concurrency(8);
        assert_eq!(config.requests_per_minute, 10);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.base_delay, Duration::from_millis(10));
        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.cooldown, Duration::from_secs(1));
        assert_eq!(config.max_concurrency, 8);
    }

    #[test]
    fn pipeline_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.top_k, 7);
        assert_eq!(config.max_discovery_urls, 50);
        assert!(config.deadline.is_none());
    }
}
