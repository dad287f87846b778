pub mod backoff;
pub mod circuit_breaker;
pub mod cleanup;
pub mod client;
pub mod config;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod rate_limit;
pub mod testutil;
pub mod traits;
pub mod urlutil;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStats, CircuitState};
pub use cleanup::clean_markdown;
pub use client::ResilientClient;
pub use config::{PipelineConfig, ResilienceConfig};
pub use error::{ApiError, ErrorClass};
pub use filter::{ScoredUrl, UrlScorer};
pub use models::{
    AttemptOutcome, DiscoveryOutcome, DiscoveryResult, PipelineCounts, PipelineResult,
    RequestAttempt, ScrapeOutcome, ScrapeRecord,
};
pub use pipeline::Pipeline;
pub use rate_limit::RateLimiter;
pub use traits::ContentApi;
