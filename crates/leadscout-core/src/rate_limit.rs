//! Sliding-window rate limiting for the remote content API.
//!
//! Admission is counted over the trailing 60 seconds, not fixed buckets:
//! every check evicts timestamps older than the window, so a burst right
//! before a minute boundary can never combine with a burst right after it
//! to exceed the ceiling.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Window length for a requests-per-minute ceiling.
const WINDOW: Duration = Duration::from_secs(60);

/// Thread-safe sliding-window rate limiter.
///
/// Admission check and timestamp recording happen in one critical section,
/// so two concurrent callers can never both take the last slot. State is
/// in-memory only; nothing survives a restart.
#[derive(Clone)]
pub struct RateLimiter {
    ceiling: u32,
    window: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            ceiling: requests_per_minute.max(1),
            window: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Acquires the window lock, recovering from poison if necessary.
    fn lock_window(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        self.window.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned rate limiter mutex");
            poisoned.into_inner()
        })
    }

    /// Try to admit one request right now.
    ///
    /// Returns `Duration::ZERO` if the call may proceed immediately (the
    /// slot is consumed atomically), or a positive wait after which the
    /// caller should ask again. A wait does not consume a slot.
    pub fn admit(&self) -> Duration {
        let now = Instant::now();
        let mut window = self.lock_window();

        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < self.ceiling as usize {
            window.push_back(now);
            return Duration::ZERO;
        }

        // Full: wait until the oldest in-window timestamp ages out.
        let oldest = *window.front().expect("ceiling >= 1, window is non-empty");
        WINDOW - now.duration_since(oldest)
    }

    /// Sleep-and-retry until admitted. Returns the total time waited.
    ///
    /// The sleep happens outside the lock; other callers (and other
    /// domains) are never blocked by a waiter.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = self.admit();
            if wait.is_zero() {
                return waited;
            }
            tracing::debug!(wait_ms = %wait.as_millis(), "Rate ceiling reached, waiting");
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Requests currently counted in the trailing window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        let window = self.lock_window();
        window
            .iter()
            .filter(|&&t| now.duration_since(t) < WINDOW)
            .count()
    }
}
