//! Scoring-based URL filtering.
//!
//! Bounds how many scrape requests a job may issue: every discovered URL
//! is scored against high-value and low-value path patterns, and only the
//! top-K non-negative URLs go on to scraping. Pure and deterministic —
//! identical input always yields identical selection order.

use serde::Serialize;
use url::Url;

/// A discovered URL with its business-relevance score. Derived, immutable,
/// discarded after selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredUrl {
    pub url: String,
    pub score: i32,
}

/// Path substrings that mark a page worth scraping.
const HIGH_VALUE_PATTERNS: &[&str] = &[
    "about",
    "team",
    "leadership",
    "services",
    "solutions",
    "case-studies",
    "portfolio",
];

/// Path substrings that mark a page as noise.
const LOW_VALUE_PATTERNS: &[&str] = &["privacy", "terms", "cookie-policy", "login", "signup"];

/// Static-asset extensions that are never worth scraping.
const ASSET_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2",
];

/// Scores URLs and selects the top-K to scrape.
#[derive(Debug, Clone)]
pub struct UrlScorer {
    high_value: Vec<String>,
    low_value: Vec<String>,
}

impl Default for UrlScorer {
    fn default() -> Self {
        Self {
            high_value: HIGH_VALUE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            low_value: LOW_VALUE_PATTERNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl UrlScorer {
    /// Override the default pattern lists (patterns are matched as
    /// lowercase substrings of the URL path).
    pub fn with_patterns(high_value: Vec<String>, low_value: Vec<String>) -> Self {
        Self {
            high_value,
            low_value,
        }
    }

    /// Score one URL: +10 for a high-value path match, -10 for a low-value
    /// match or static-asset extension, 0 otherwise. A URL matching both
    /// buckets nets zero.
    pub fn score(&self, url: &str) -> i32 {
        let path = Url::parse(url)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|_| url.to_ascii_lowercase());

        let mut score = 0;
        if self.high_value.iter().any(|p| path.contains(p.as_str())) {
            score += 10;
        }
        let is_asset = ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext));
        if is_asset || self.low_value.iter().any(|p| path.contains(p.as_str())) {
            score -= 10;
        }
        score
    }

    /// Select the top-K URLs to scrape.
    ///
    /// Stable sort by descending score (ties keep discovery order);
    /// negative-scored URLs are never included, even when fewer than K
    /// candidates remain.
    pub fn select(&self, urls: &[String], top_k: usize) -> Vec<ScoredUrl> {
        let mut scored: Vec<ScoredUrl> = urls
            .iter()
            .map(|url| ScoredUrl {
                url: url.clone(),
                score: self.score(url),
            })
            .filter(|s| s.score >= 0)
            .collect();

        scored.sort_by_key(|s| std::cmp::Reverse(s.score));
        scored.truncate(top_k);

        tracing::debug!(
            candidates = urls.len(),
            selected = scored.len(),
            top_k,
            "URL filter selection complete"
        );
        scored
    }
}
