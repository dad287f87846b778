//! Test utilities: a scripted mock of the remote content API.
//!
//! Handwritten mock for dependency injection in unit tests, using
//! `Arc<Mutex<_>>` for interior mutability so tests can script response
//! sequences and assert on recorded calls.

use std::sync::{Arc, Mutex};

use crate::error::ApiError;
use crate::traits::ContentApi;

/// Mock content API with scripted per-operation response queues.
///
/// Each call pops the next scripted response; an empty queue yields a
/// deterministic default success. All calls are recorded for assertions
/// on attempt counts and targets.
#[derive(Clone, Default)]
pub struct MockContentApi {
    discover_responses: Arc<Mutex<Vec<Result<Vec<String>, ApiError>>>>,
    fetch_responses: Arc<Mutex<Vec<Result<String, ApiError>>>>,
    /// Artificial latency applied to every fetch, for deadline tests.
    fetch_delay: Arc<Mutex<std::time::Duration>>,
    /// Domains passed to `discover`, in call order.
    pub discover_calls: Arc<Mutex<Vec<String>>>,
    /// URLs passed to `fetch`, in call order.
    pub fetch_calls: Arc<Mutex<Vec<String>>>,
}

impl MockContentApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a single successful discovery returning these URLs.
    pub fn with_discovered(urls: Vec<&str>) -> Self {
        let api = Self::new();
        api.push_discover(Ok(urls.into_iter().map(String::from).collect()));
        api
    }

    pub fn push_discover(&self, response: Result<Vec<String>, ApiError>) {
        self.discover_responses.lock().unwrap().push(response);
    }

    pub fn push_fetch(&self, response: Result<String, ApiError>) {
        self.fetch_responses.lock().unwrap().push(response);
    }

    pub fn set_fetch_delay(&self, delay: std::time::Duration) {
        *self.fetch_delay.lock().unwrap() = delay;
    }

    pub fn discover_call_count(&self) -> usize {
        self.discover_calls.lock().unwrap().len()
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_calls.lock().unwrap().len()
    }

    pub fn total_call_count(&self) -> usize {
        self.discover_call_count() + self.fetch_call_count()
    }
}

impl ContentApi for MockContentApi {
    async fn discover(&self, domain: &str, _limit: usize) -> Result<Vec<String>, ApiError> {
        self.discover_calls.lock().unwrap().push(domain.to_string());
        let mut responses = self.discover_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(vec![domain.to_string()])
        } else {
            responses.remove(0)
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, ApiError> {
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.fetch_calls.lock().unwrap().push(url.to_string());
        let mut responses = self.fetch_responses.lock().unwrap();
        if responses.is_empty() {
            Ok(format!("# Content from {url}"))
        } else {
            responses.remove(0)
        }
    }
}
