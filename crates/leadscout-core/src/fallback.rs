//! Degraded operation when no API key is configured.
//!
//! Discovery returns common business-site paths guessed against the
//! target domain; scraping returns a placeholder naming the URL. Neither
//! touches the network, so the rate limiter and circuit breaker are
//! bypassed entirely.

use url::Url;

/// Common paths found on business websites, roughly ordered by value.
const COMMON_PATHS: &[&str] = &[
    "",
    "/about",
    "/about-us",
    "/our-story",
    "/mission",
    "/team",
    "/leadership",
    "/our-team",
    "/services",
    "/solutions",
    "/products",
    "/what-we-do",
    "/case-studies",
    "/portfolio",
    "/our-work",
    "/clients",
    "/customers",
    "/testimonials",
    "/blog",
    "/news",
    "/insights",
    "/resources",
    "/contact",
    "/careers",
    "/investors",
    "/press",
];

/// Heuristic URL guesses for a site, in place of a real crawl.
///
/// Not all of these will exist; they are candidates for the filter stage,
/// capped at `limit`.
pub fn discovery_urls(base: &Url, limit: usize) -> Vec<String> {
    let origin = format!(
        "{}://{}",
        base.scheme(),
        base.host_str().unwrap_or_default()
    );
    COMMON_PATHS
        .iter()
        .take(limit)
        .map(|path| format!("{origin}{path}"))
        .collect()
}

/// Placeholder standing in for scraped content.
pub fn scrape_placeholder(url: &str) -> String {
    format!("[Content from {url} would be scraped here]")
}
