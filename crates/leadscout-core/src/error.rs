use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error types for leadscout.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Circuit breaker rejected the call without touching the network.
    #[error("circuit open; retry after {} seconds", retry_after.as_secs())]
    CircuitOpen { retry_after: Duration },

    /// Upstream returned HTTP 429.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Upstream returned a non-success status other than 429.
    #[error("upstream error (HTTP {status}): {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Request timed out.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("network error: {0}")]
    Network(String),

    /// Target URL could not be parsed or normalized.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything the other variants don't cover (malformed upstream
    /// response, unexpected internal failure).
    #[error("unclassified error: {0}")]
    Unclassified(String),
}

/// Retry-ability verdict for a failed request attempt.
///
/// Single source of truth consulted by both the backoff policy (retry or
/// not) and the circuit breaker (what counts as upstream distress).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Timeout, connection failure, or 5xx. Retry with backoff.
    RetryableTransient,
    /// Upstream 429. Retry with backoff; breaker counts it.
    RetryableRateLimited,
    /// Upstream 4xx other than 429. The request itself is bad; do not
    /// retry and do not count toward the breaker.
    NonRetryableClient,
    /// Everything else. Fail immediately, logged for investigation.
    NonRetryableOther,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClass::RetryableTransient | ErrorClass::RetryableRateLimited
        )
    }

    /// Only upstream distress trips the circuit; bad requests don't.
    pub fn trips_circuit(&self) -> bool {
        self.is_retryable()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::RetryableTransient => "retryable_transient",
            ErrorClass::RetryableRateLimited => "retryable_rate_limited",
            ErrorClass::NonRetryableClient => "non_retryable_client",
            ErrorClass::NonRetryableOther => "non_retryable_other",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ApiError {
    /// Classify this failure for retry and circuit decisions.
    ///
    /// The classification of an attempt is fixed at the moment the attempt
    /// fails; callers must not re-derive it later from mutated state.
    pub fn classify(&self) -> ErrorClass {
        match self {
            ApiError::RateLimited => ErrorClass::RetryableRateLimited,
            ApiError::UpstreamStatus { status: 429, .. } => ErrorClass::RetryableRateLimited,
            ApiError::UpstreamStatus {
                status: 500..=599, ..
            } => ErrorClass::RetryableTransient,
            ApiError::UpstreamStatus {
                status: 400..=499, ..
            } => ErrorClass::NonRetryableClient,
            ApiError::Timeout(_) | ApiError::Network(_) => ErrorClass::RetryableTransient,
            // Circuit-open is a local verdict, not an upstream outcome;
            // never retried within the same call.
            ApiError::CircuitOpen { .. } => ErrorClass::NonRetryableOther,
            ApiError::UpstreamStatus { .. }
            | ApiError::InvalidUrl(_)
            | ApiError::Serialization(_)
            | ApiError::Unclassified(_) => ErrorClass::NonRetryableOther,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.classify().is_retryable()
    }
}
