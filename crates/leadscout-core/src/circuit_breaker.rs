//! Circuit breaker guarding the remote content API.
//!
//! Protects against cascading failures when the upstream scraping service
//! is degraded or rate-limiting hard.
//!
//! # Circuit States
//!
//! ```text
//! CLOSED (healthy) --[N failures in window]--> OPEN (rejecting) --[cooldown]--> HALF_OPEN (one trial)
//!                                                                                   |
//!                                            <--[trial failure]--                   |
//!                                                                                   |
//! CLOSED <------------------------------[trial success]----------------------------+
//! ```
//!
//! Failures are counted over a sliding time window (lazy eviction of stale
//! entries), not as a consecutive-failure streak. Successes never decrement
//! the count mid-window; only closing the circuit clears it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::ResilienceConfig;
use crate::error::ApiError;

/// Current state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed - requests flow normally.
    Closed,
    /// Circuit is open - requests are rejected immediately.
    Open,
    /// Circuit is half-open - a single trial request probes recovery.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Internal state tracking for the circuit breaker.
#[derive(Debug)]
struct CircuitBreakerInner {
    state: CircuitState,
    /// Timestamps of circuit-tripping failures within the current window.
    failures: VecDeque<Instant>,
    open_until: Option<Instant>,
    /// Set while the half-open trial request is in flight.
    trial_in_flight: bool,
    /// When the current trial was claimed; lets an abandoned trial (task
    /// dropped before reporting) be reclaimed after a cooldown.
    trial_started: Option<Instant>,
    last_error_message: Option<String>,
}

/// Snapshot of breaker state for monitoring.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failures_in_window: usize,
    pub last_error: Option<String>,
    pub time_until_half_open: Option<Duration>,
}

/// Thread-safe circuit breaker, one instance per target API.
///
/// Shared between concurrent workers via `Clone`; every decision is taken
/// under a single mutex so callers observe a serialized view. No lock is
/// ever held across a network call.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    threshold: u32,
    window: Duration,
    cooldown: Duration,
    inner: Arc<Mutex<CircuitBreakerInner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &ResilienceConfig) -> Self {
        Self {
            name: name.into(),
            threshold: config.failure_threshold.max(1),
            window: config.failure_window,
            cooldown: config.cooldown,
            inner: Arc::new(Mutex::new(CircuitBreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                open_until: None,
                trial_in_flight: false,
                trial_started: None,
                last_error_message: None,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, CircuitBreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(circuit = %self.name, "Recovered from poisoned mutex");
            poisoned.into_inner()
        })
    }

    /// Returns the current state, handling lazy Open → HalfOpen transitions.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock_inner();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.lock_inner();
        self.maybe_transition_to_half_open(&mut inner);
        Self::evict_stale(&mut inner, self.window);

        let time_until_half_open = if inner.state == CircuitState::Open {
            inner
                .open_until
                .map(|t| t.saturating_duration_since(Instant::now()))
        } else {
            None
        };

        CircuitBreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failures_in_window: inner.failures.len(),
            last_error: inner.last_error_message.clone(),
            time_until_half_open,
        }
    }

    /// Ask permission to issue one request.
    ///
    /// `Ok(())` means proceed (in HalfOpen this claims the single trial
    /// slot — the caller must report the outcome). `Err(retry_after)` means
    /// the call is rejected with no network attempt.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut inner = self.lock_inner();
        self.maybe_transition_to_half_open(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let retry_after = inner
                    .open_until
                    .map(|t| t.saturating_duration_since(Instant::now()))
                    .unwrap_or(self.cooldown);
                Err(retry_after)
            }
            CircuitState::HalfOpen => {
                let stale = inner
                    .trial_started
                    .is_some_and(|t| Instant::now().duration_since(t) >= self.cooldown);
                if inner.trial_in_flight && !stale {
                    Err(self.cooldown)
                } else {
                    inner.trial_in_flight = true;
                    inner.trial_started = Some(Instant::now());
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock_inner();
        self.settle_healthy(&mut inner);
    }

    pub fn record_failure(&self, error: &ApiError) {
        let mut inner = self.lock_inner();

        if !error.classify().trips_circuit() {
            // A bad request reached a healthy upstream; for circuit
            // purposes that is indistinguishable from a success.
            self.settle_healthy(&mut inner);
            return;
        }

        inner.last_error_message = Some(error.to_string());

        match inner.state {
            CircuitState::Closed => {
                let now = Instant::now();
                Self::evict_stale(&mut inner, self.window);
                inner.failures.push_back(now);

                if inner.failures.len() >= self.threshold as usize {
                    tracing::warn!(
                        circuit = %self.name,
                        failures = inner.failures.len(),
                        error = %error,
                        "Circuit breaker opening after {} failures in window",
                        inner.failures.len()
                    );
                    inner.state = CircuitState::Open;
                    inner.open_until = Some(now + self.cooldown);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(
                    circuit = %self.name,
                    error = %error,
                    "Circuit breaker probe failed, returning to open state"
                );
                inner.state = CircuitState::Open;
                inner.open_until = Some(Instant::now() + self.cooldown);
                inner.trial_in_flight = false;
                inner.trial_started = None;
            }
            CircuitState::Open => {}
        }
    }

    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        tracing::info!(circuit = %self.name, "Circuit breaker manually reset");
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.open_until = None;
        inner.trial_in_flight = false;
        inner.trial_started = None;
        inner.last_error_message = None;
    }

    /// Success (or non-tripping failure): close from half-open, clear the
    /// window. Successes in Closed don't touch the failure window.
    fn settle_healthy(&self, inner: &mut CircuitBreakerInner) {
        if inner.state == CircuitState::HalfOpen {
            tracing::info!(circuit = %self.name, "Circuit breaker closing after successful probe");
            inner.state = CircuitState::Closed;
            inner.failures.clear();
            inner.open_until = None;
            inner.trial_in_flight = false;
            inner.trial_started = None;
            inner.last_error_message = None;
        }
    }

    fn maybe_transition_to_half_open(&self, inner: &mut CircuitBreakerInner) {
        if inner.state == CircuitState::Open
            && let Some(open_until) = inner.open_until
            && Instant::now() >= open_until
        {
            tracing::info!(
                circuit = %self.name,
                "Circuit breaker transitioning to half-open state"
            );
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
            inner.trial_started = None;
        }
    }

    fn evict_stale(inner: &mut CircuitBreakerInner, window: Duration) {
        let now = Instant::now();
        while let Some(&oldest) = inner.failures.front() {
            if now.duration_since(oldest) >= window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(threshold: u32, cooldown: Duration) -> ResilienceConfig {
        ResilienceConfig::default().with_breaker(threshold, Duration::from_secs(60), cooldown)
    }

    fn transient() -> ApiError {
        ApiError::Network("connection reset".into())
    }

    #[test]
    fn circuit_starts_closed() {
        let cb = CircuitBreaker::new("test", &ResilienceConfig::default());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn circuit_opens_after_threshold_failures() {
        let cb = CircuitBreaker::new("test", &config(3, Duration::from_secs(60)));
        for _ in 0..3 {
            cb.record_failure(&transient());
        }
        assert_eq!(cb.state(), CircuitState::Open);
        let retry_after = cb.try_acquire().unwrap_err();
        assert!(retry_after > Duration::ZERO);
    }

    #[test]
    fn circuit_stays_closed_below_threshold() {
        let cb = CircuitBreaker::new("test", &config(5, Duration::from_secs(60)));
        for _ in 0..4 {
            cb.record_failure(&transient());
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn successes_do_not_clear_window_failures() {
        let cb = CircuitBreaker::new("test", &config(5, Duration::from_secs(60)));
        for _ in 0..4 {
            cb.record_failure(&transient());
        }
        cb.record_success();
        cb.record_failure(&transient());
        // 5 failures within the window despite the interleaved success.
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn client_errors_do_not_count() {
        let cb = CircuitBreaker::new("test", &config(2, Duration::from_secs(60)));
        for _ in 0..10 {
            cb.record_failure(&ApiError::UpstreamStatus {
                status: 404,
                message: "not found".into(),
            });
        }
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn rate_limited_failures_count() {
        let cb = CircuitBreaker::new("test", &config(2, Duration::from_secs(60)));
        cb.record_failure(&ApiError::RateLimited);
        cb.record_failure(&ApiError::RateLimited);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn circuit_transitions_to_half_open_after_cooldown() {
        let cb = CircuitBreaker::new("test", &config(1, Duration::from_millis(10)));
        cb.record_failure(&transient());
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_admits_exactly_one_trial() {
        let cb = CircuitBreaker::new("test", &config(1, Duration::from_millis(1)));
        cb.record_failure(&transient());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(cb.try_acquire().is_ok());
        assert!(cb.try_acquire().is_err());
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn abandoned_trial_is_reclaimed_after_cooldown() {
        let cb = CircuitBreaker::new("test", &config(1, Duration::from_millis(10)));
        cb.record_failure(&transient());
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        // Trial claimed but never reported (caller dropped mid-flight).
        assert!(cb.try_acquire().is_ok());
        assert!(cb.try_acquire().is_err());

        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn trial_success_closes_and_resets_counter() {
        let cb = CircuitBreaker::new("test", &config(1, Duration::from_millis(1)));
        cb.record_failure(&transient());
        std::thread::sleep(Duration::from_millis(5));

        assert!(cb.try_acquire().is_ok());
        cb.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.stats().failures_in_window, 0);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn trial_failure_reopens_and_extends_cooldown() {
        let cb = CircuitBreaker::new("test", &config(1, Duration::from_millis(20)));
        cb.record_failure(&transient());
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        assert!(cb.try_acquire().is_ok());
        cb.record_failure(&transient());

        assert_eq!(cb.state(), CircuitState::Open);
        let retry_after = cb.try_acquire().unwrap_err();
        assert!(retry_after > Duration::ZERO);
    }

    #[test]
    fn manual_reset_closes_the_circuit() {
        let cb = CircuitBreaker::new("test", &config(1, Duration::from_secs(300)));
        cb.record_failure(&transient());
        assert_eq!(cb.state(), CircuitState::Open);

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn stats_report_window_and_remaining_cooldown() {
        let cb = CircuitBreaker::new("api", &config(2, Duration::from_secs(30)));
        cb.record_failure(&transient());

        let stats = cb.stats();
        assert_eq!(stats.name, "api");
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.failures_in_window, 1);
        assert!(stats.last_error.is_some());

        cb.record_failure(&transient());
        let stats = cb.stats();
        assert_eq!(stats.state, CircuitState::Open);
        assert!(stats.time_until_half_open.unwrap() > Duration::from_secs(25));
    }
}
