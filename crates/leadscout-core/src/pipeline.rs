//! Orchestrates one analysis run: discover → filter → scrape → aggregate.
//!
//! The only component with business sequencing. Discovery failure
//! short-circuits into a discovery-failure aggregate; individual scrape
//! failures are recorded per-URL and never abort sibling scrapes. An
//! optional overall deadline abandons in-flight scrapes while keeping
//! everything already completed — partial success is a valid terminal
//! outcome.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::cleanup::clean_markdown;
use crate::client::ResilientClient;
use crate::config::PipelineConfig;
use crate::filter::UrlScorer;
use crate::models::{PipelineCounts, PipelineResult, ScrapeRecord};
use crate::traits::ContentApi;

/// Runs the discover/filter/scrape pipeline for one domain at a time.
///
/// Holds its own client (and thus its own limiter/breaker instances), so
/// multiple pipelines against different APIs stay isolated.
pub struct Pipeline<A: ContentApi> {
    client: ResilientClient<A>,
    scorer: UrlScorer,
    config: PipelineConfig,
}

impl<A: ContentApi + 'static> Pipeline<A> {
    pub fn new(client: ResilientClient<A>, config: PipelineConfig) -> Self {
        Self {
            client,
            scorer: UrlScorer::default(),
            config,
        }
    }

    pub fn with_scorer(mut self, scorer: UrlScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Run the full pipeline for a domain and aggregate the outcome.
    ///
    /// Never returns an error: every failure mode is represented in the
    /// aggregate so the surrounding workflow can still emit a report.
    pub async fn run(&self, domain: &str) -> PipelineResult {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(%request_id, %domain, "Pipeline starting");

        // 1. Discover (a deadline here becomes a discovery failure).
        let discovery_fut = self.client.discover(domain, self.config.max_discovery_urls);
        let discovery = match self.config.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, discovery_fut).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(%request_id, %domain, "Deadline elapsed during discovery");
                    crate::models::DiscoveryResult::failed(domain, "deadline exceeded")
                }
            },
            None => discovery_fut.await,
        };

        if discovery.outcome.is_failure() {
            tracing::warn!(%request_id, outcome = %discovery.outcome, "Pipeline short-circuited on discovery failure");
            return self.aggregate(request_id, discovery, Vec::new(), Vec::new());
        }

        // 2. Filter to the top-K business-relevant URLs.
        let selected = self.scorer.select(&discovery.urls, self.config.top_k);
        let filtered: Vec<String> = selected.iter().map(|s| s.url.clone()).collect();
        tracing::info!(
            %request_id,
            discovered = discovery.urls.len(),
            filtered = filtered.len(),
            "Filter selection complete"
        );

        // 3. Scrape with bounded fan-out; the client's semaphore caps
        //    in-flight remote calls across all tasks.
        let scraped = self.scrape_all(&filtered, started).await;

        self.aggregate(request_id, discovery, filtered, scraped)
    }

    /// Fan out scrapes, tolerate per-URL failures, honor the deadline.
    async fn scrape_all(&self, urls: &[String], started: Instant) -> Vec<ScrapeRecord> {
        let completed: Arc<Mutex<Vec<(usize, ScrapeRecord)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let fallback = self.client.fallback_mode();

        let mut handles = Vec::with_capacity(urls.len());
        for (index, url) in urls.iter().enumerate() {
            let client = self.client.clone();
            let url = url.clone();
            let completed = Arc::clone(&completed);
            handles.push(tokio::spawn(async move {
                let record = match client.scrape(&url).await {
                    Ok(content) if fallback => ScrapeRecord::fallback(url, content),
                    Ok(content) => ScrapeRecord::success(url, clean_markdown(&content)),
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "Scrape failed, recording error entry");
                        ScrapeRecord::failed(url, &e)
                    }
                };
                completed
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push((index, record));
            }));
        }

        let join_all = async {
            for handle in &mut handles {
                let _ = handle.await;
            }
        };

        match self.config.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(started.elapsed());
                if tokio::time::timeout(remaining, join_all).await.is_err() {
                    for handle in &handles {
                        handle.abort();
                    }
                    tracing::warn!(
                        total = urls.len(),
                        "Deadline elapsed; abandoning in-flight scrapes"
                    );
                }
            }
            None => join_all.await,
        }

        let mut records = Arc::try_unwrap(completed)
            .map(|m| m.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
            .unwrap_or_else(|arc| {
                // Abandoned tasks may still hold a reference; snapshot
                // what has completed so far.
                arc.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone()
            });
        records.sort_by_key(|(index, _)| *index);
        records.into_iter().map(|(_, record)| record).collect()
    }

    fn aggregate(
        &self,
        request_id: Uuid,
        discovery: crate::models::DiscoveryResult,
        filtered: Vec<String>,
        scraped: Vec<ScrapeRecord>,
    ) -> PipelineResult {
        let counts = PipelineCounts {
            discovered: discovery.urls.len(),
            filtered: filtered.len(),
            scraped: scraped.iter().filter(|r| r.is_success()).count(),
        };
        tracing::info!(
            %request_id,
            discovered = counts.discovered,
            filtered = counts.filtered,
            scraped = counts.scraped,
            outcome = %discovery.outcome,
            "Pipeline complete"
        );
        PipelineResult {
            request_id,
            domain: discovery.domain,
            generated_at: Utc::now(),
            discovery_outcome: discovery.outcome,
            discovered: discovery.urls,
            filtered,
            scraped,
            counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ResilienceConfig;
    use crate::error::ApiError;
    use crate::models::DiscoveryOutcome;
    use crate::testutil::MockContentApi;

    fn fast_client(api: MockContentApi) -> ResilientClient<MockContentApi> {
        ResilientClient::new(
            api,
            &ResilienceConfig::default()
                .with_backoff(Duration::from_millis(5), Duration::from_millis(50))
                .with_requests_per_minute(1000),
        )
    }

    // 20 discovered URLs: 5 high-value, 3 low-value, 12 neutral. K=7
    // selects the high-value five plus the first two neutral, excludes
    // all low-value, and scrapes everything selected.
    #[tokio::test]
    async fn end_to_end_discovers_filters_and_scrapes() {
        let mut paths = vec!["/about", "/team", "/leadership", "/services", "/portfolio"];
        paths.extend(["/privacy", "/terms", "/login"]);
        let neutral: Vec<String> = (0..12).map(|i| format!("/page-{i}")).collect();
        paths.extend(neutral.iter().map(|s| s.as_str()));
        let urls: Vec<String> = paths
            .iter()
            .map(|p| format!("https://example.com{p}"))
            .collect();

        let api = MockContentApi::with_discovered(urls.iter().map(|s| s.as_str()).collect());
        let pipeline = Pipeline::new(fast_client(api.clone()), PipelineConfig::default());

        let result = pipeline.run("example.com").await;

        assert_eq!(result.discovery_outcome, DiscoveryOutcome::Success);
        assert_eq!(result.counts.discovered, 20);
        assert_eq!(result.counts.filtered, 7);
        assert_eq!(result.counts.scraped, 7);
        assert_eq!(result.filtered[0], "https://example.com/about");
        assert_eq!(result.filtered[5], "https://example.com/page-0");
        assert!(
            !result
                .filtered
                .iter()
                .any(|u| u.contains("privacy") || u.contains("terms") || u.contains("login"))
        );
        assert_eq!(api.fetch_call_count(), 7);
        assert!(result.scraped.iter().all(|r| r.is_success()));
        // Records come back in selection order despite concurrent scraping.
        assert_eq!(result.scraped[0].url, result.filtered[0]);
        assert_eq!(result.scraped[6].url, result.filtered[6]);
    }

    #[tokio::test]
    async fn individual_scrape_failures_do_not_abort_siblings() {
        let api = MockContentApi::with_discovered(vec![
            "https://example.com/about",
            "https://example.com/team",
            "https://example.com/services",
        ]);
        // Non-retryable failures so each consumes exactly one queue slot.
        api.push_fetch(Err(ApiError::UpstreamStatus {
            status: 404,
            message: "gone".into(),
        }));
        api.push_fetch(Err(ApiError::UpstreamStatus {
            status: 410,
            message: "gone".into(),
        }));
        let pipeline = Pipeline::new(fast_client(api), PipelineConfig::default());

        let result = pipeline.run("example.com").await;

        assert_eq!(result.counts.filtered, 3);
        assert_eq!(result.counts.scraped, 1);
        assert_eq!(result.scraped.len(), 3);
        assert_eq!(
            result.scraped.iter().filter(|r| !r.is_success()).count(),
            2
        );
        // A failed scrape is an error entry, not a pipeline failure.
        assert_eq!(result.discovery_outcome, DiscoveryOutcome::Success);
    }

    #[tokio::test]
    async fn discovery_failure_short_circuits() {
        let api = MockContentApi::new();
        api.push_discover(Err(ApiError::UpstreamStatus {
            status: 403,
            message: "forbidden".into(),
        }));
        let pipeline = Pipeline::new(fast_client(api.clone()), PipelineConfig::default());

        let result = pipeline.run("example.com").await;

        assert!(result.discovery_outcome.is_failure());
        assert!(result.discovered.is_empty());
        assert!(result.filtered.is_empty());
        assert!(result.scraped.is_empty());
        assert_eq!(result.counts.scraped, 0);
        assert_eq!(api.fetch_call_count(), 0);
    }

    #[tokio::test]
    async fn fallback_mode_produces_a_full_report() {
        let client = ResilientClient::<MockContentApi>::without_api(
            &ResilienceConfig::default().with_requests_per_minute(1000),
        );
        let pipeline = Pipeline::new(client, PipelineConfig::default());

        let result = pipeline.run("example.com").await;

        assert_eq!(result.discovery_outcome, DiscoveryOutcome::Fallback);
        assert!(!result.discovered.is_empty());
        assert_eq!(result.counts.filtered, 7);
        assert_eq!(result.counts.scraped, 7);
        for record in &result.scraped {
            match &record.outcome {
                crate::models::ScrapeOutcome::Success { fallback, content } => {
                    assert!(*fallback);
                    assert!(!content.is_empty());
                }
                other => panic!("expected fallback success, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn scraped_content_is_cleaned() {
        let api = MockContentApi::with_discovered(vec!["https://example.com/about"]);
        api.push_fetch(Ok("# About\n\n\n\n\nSpaced    text   ".into()));
        let pipeline = Pipeline::new(fast_client(api), PipelineConfig::default());

        let result = pipeline.run("example.com").await;
        assert_eq!(
            result.scraped[0].content().unwrap(),
            "# About\n\nSpaced text"
        );
    }

    #[tokio::test]
    async fn deadline_keeps_partial_results() {
        let api = MockContentApi::with_discovered(vec![
            "https://example.com/about",
            "https://example.com/team",
            "https://example.com/services",
            "https://example.com/solutions",
        ]);
        api.set_fetch_delay(Duration::from_millis(500));
        let pipeline = Pipeline::new(
            fast_client(api),
            PipelineConfig::default().with_deadline(Duration::from_millis(100)),
        );

        let started = std::time::Instant::now();
        let result = pipeline.run("example.com").await;
        let elapsed = started.elapsed();

        // Returned at the deadline, not after every slow scrape.
        assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");
        assert_eq!(result.discovery_outcome, DiscoveryOutcome::Success);
        assert_eq!(result.counts.filtered, 4);
        assert!(result.counts.scraped < 4);
    }

    #[tokio::test]
    async fn rate_limited_discovery_still_scrapes_the_seed() {
        let api = MockContentApi::new();
        for _ in 0..4 {
            api.push_discover(Err(ApiError::RateLimited));
        }
        let client = ResilientClient::new(
            api.clone(),
            &ResilienceConfig::default()
                .with_backoff(Duration::from_millis(5), Duration::from_millis(50))
                .with_requests_per_minute(1000)
                .with_max_retries(3),
        );
        let pipeline = Pipeline::new(client, PipelineConfig::default());

        let result = pipeline.run("example.com").await;

        assert_eq!(result.discovery_outcome, DiscoveryOutcome::RateLimited);
        assert_eq!(result.discovered, vec!["https://example.com/".to_string()]);
        assert_eq!(result.counts.filtered, 1);
        assert_eq!(api.fetch_call_count(), 1);
    }
}
