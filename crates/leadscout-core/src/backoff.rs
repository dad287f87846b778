//! Exponential backoff with jitter.
//!
//! A pure policy: given the attempt number that just failed and its error
//! classification, decide whether to retry and how long to wait first.
//! Stateless — attempt counting lives in the caller's retry loop.

use std::time::Duration;

use crate::config::ResilienceConfig;
use crate::error::ErrorClass;

/// Computes retry delays: `base * 2^(attempt-1)`, capped at `max_delay`
/// before jitter, plus uniform jitter in `[0, delay/2]`.
///
/// No delay is applied before the first attempt; the policy only runs
/// between a failure and its retry.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
}

impl BackoffPolicy {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            max_retries: config.max_retries,
        }
    }

    /// Delay before retrying after the given failed attempt (1-indexed),
    /// or `None` if the call should stop retrying.
    pub fn next_delay(&self, attempt: u32, class: ErrorClass) -> Option<Duration> {
        if !class.is_retryable() || attempt > self.max_retries {
            return None;
        }
        let base = self.computed_base(attempt);
        let jitter_cap = (base / 2).as_millis() as u64;
        Some(base + Duration::from_millis(rand_jitter_ms(jitter_cap)))
    }

    /// Pre-jitter delay for an attempt: exponential, capped at `max_delay`.
    pub fn computed_base(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = 1u64 << exponent;
        let millis = (self.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis).min(self.max_delay)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

// ---------------------------------------------------------------------------
// Jitter based on std — avoids pulling in the `rand` crate.
// Uses a simple xorshift seeded from the current time.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    // Seed from high-resolution clock — good enough for jitter, not crypto.
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
