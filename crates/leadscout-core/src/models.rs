use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ErrorClass};

/// How a discovery call concluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum DiscoveryOutcome {
    /// Upstream returned a URL list.
    Success,
    /// Upstream rate-limited us past the retry budget.
    RateLimited,
    /// No API key; heuristic URL patterns were used instead.
    Fallback,
    /// Discovery failed terminally for the given reason.
    Failed(String),
}

impl DiscoveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryOutcome::Success => "success",
            DiscoveryOutcome::RateLimited => "rate_limited",
            DiscoveryOutcome::Fallback => "fallback",
            DiscoveryOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DiscoveryOutcome::Failed(_))
    }
}

impl std::fmt::Display for DiscoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of the discovery phase for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub domain: String,
    /// Discovered URLs, same-domain, deduplicated, in discovery order.
    pub urls: Vec<String>,
    pub outcome: DiscoveryOutcome,
}

impl DiscoveryResult {
    pub fn failed(domain: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            urls: Vec::new(),
            outcome: DiscoveryOutcome::Failed(reason.into()),
        }
    }
}

/// One record of the retry loop, for observability. Immutable once the
/// outcome is set; the classification attached at failure time is final.
#[derive(Debug, Clone)]
pub struct RequestAttempt {
    pub target: String,
    /// 1-indexed attempt number.
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Success,
    Failed(ErrorClass),
}

/// Outcome of scraping a single URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ScrapeOutcome {
    Success {
        content: String,
        /// True when the content is a fallback placeholder, not a real scrape.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        fallback: bool,
    },
    Failed {
        error: String,
        class: ErrorClass,
    },
}

/// Per-URL scrape result included in the aggregate. Never mutated after
/// creation; a failed scrape is data, not an error that propagates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRecord {
    pub url: String,
    #[serde(flatten)]
    pub outcome: ScrapeOutcome,
}

impl ScrapeRecord {
    pub fn success(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: ScrapeOutcome::Success {
                content: content.into(),
                fallback: false,
            },
        }
    }

    pub fn fallback(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: ScrapeOutcome::Success {
                content: content.into(),
                fallback: true,
            },
        }
    }

    pub fn failed(url: impl Into<String>, error: &ApiError) -> Self {
        Self {
            url: url.into(),
            outcome: ScrapeOutcome::Failed {
                error: error.to_string(),
                class: error.classify(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ScrapeOutcome::Success { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            ScrapeOutcome::Success { content, .. } => Some(content),
            ScrapeOutcome::Failed { .. } => None,
        }
    }
}

/// Summary counts for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCounts {
    /// URLs discovered (after same-domain filtering and dedup).
    pub discovered: usize,
    /// URLs selected for scraping.
    pub filtered: usize,
    /// URLs scraped successfully.
    pub scraped: usize,
}

/// Aggregate handed to the external report writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub request_id: Uuid,
    pub domain: String,
    pub generated_at: DateTime<Utc>,
    pub discovery_outcome: DiscoveryOutcome,
    pub discovered: Vec<String>,
    pub filtered: Vec<String>,
    pub scraped: Vec<ScrapeRecord>,
    pub counts: PipelineCounts,
}
