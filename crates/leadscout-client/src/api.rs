use std::time::Duration;

use leadscout_core::error::ApiError;
use leadscout_core::traits::ContentApi;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev/v2";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP implementation of [`ContentApi`] against a Firecrawl-compatible
/// discovery/scraping API.
///
/// Maps wire-level outcomes onto the error taxonomy the retry loop
/// expects: 429 becomes [`ApiError::RateLimited`], other non-success
/// statuses become [`ApiError::UpstreamStatus`], and transport failures
/// become [`ApiError::Timeout`] or [`ApiError::Network`]. Rate limiting,
/// retries, and circuit breaking all live a layer above; this type only
/// does one request per call.
#[derive(Clone)]
pub struct HttpContentApi {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl HttpContentApi {
    pub fn new(api_key: &str) -> Result<Self, ApiError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, ApiError> {
        Self::build(api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, ApiError> {
        Self::build(&self.api_key, &self.base_url, timeout)
    }

    fn build(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }

    async fn post_json<T: Serialize>(
        &self,
        endpoint: &str,
        payload: &T,
    ) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    ApiError::Network(format!("connection failed: {e}"))
                } else {
                    ApiError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ApiError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<WireError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ApiError::UpstreamStatus {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::Unclassified(format!("malformed response body: {e}")))
    }
}

// ---- wire types ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CrawlRequest<'a> {
    url: &'a str,
    // Map mode returns URLs without fetching their content.
    mode: &'static str,
    limit: usize,
    include_subdomains: bool,
    max_depth: u32,
    allow_external_links: bool,
    ignore_sitemap: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 1],
    only_main_content: bool,
    wait_for: u64,
    timeout: u64,
}

#[derive(Deserialize, Default)]
struct CrawlResponse {
    #[serde(default)]
    data: Vec<CrawlItem>,
    #[serde(default)]
    urls: Vec<String>,
}

/// Map mode returns an array of URL objects; some deployments return
/// bare strings. Anything else is skipped.
#[derive(Deserialize)]
#[serde(untagged)]
enum CrawlItem {
    Entry { url: String },
    Plain(String),
    Other(serde_json::Value),
}

#[derive(Deserialize, Default)]
struct ScrapeResponse {
    data: Option<ScrapeData>,
    content: Option<String>,
    markdown: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScrapeData {
    Doc {
        markdown: Option<String>,
        content: Option<String>,
        text: Option<String>,
        html: Option<String>,
    },
    Plain(String),
}

#[derive(Deserialize)]
struct WireError {
    error: String,
}

fn extract_urls(response: CrawlResponse) -> Vec<String> {
    if !response.data.is_empty() {
        return response
            .data
            .into_iter()
            .filter_map(|item| match item {
                CrawlItem::Entry { url } => Some(url),
                CrawlItem::Plain(url) => Some(url),
                CrawlItem::Other(_) => None,
            })
            .collect();
    }
    response.urls
}

fn extract_content(response: ScrapeResponse) -> String {
    match response.data {
        Some(ScrapeData::Doc {
            markdown,
            content,
            text,
            html,
        }) => [markdown, content, text, html]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or_default(),
        Some(ScrapeData::Plain(s)) => s,
        None => response
            .content
            .or(response.markdown)
            .unwrap_or_default(),
    }
}

impl ContentApi for HttpContentApi {
    async fn discover(&self, domain: &str, limit: usize) -> Result<Vec<String>, ApiError> {
        let request = CrawlRequest {
            url: domain,
            mode: "map",
            limit,
            include_subdomains: false,
            max_depth: 3,
            allow_external_links: false,
            ignore_sitemap: false,
        };

        debug!(domain, limit, "crawl request");
        let body = self.post_json("/crawl", &request).await?;
        let parsed: CrawlResponse = serde_json::from_value(body)?;

        let mut urls = extract_urls(parsed);
        urls.truncate(limit);
        info!(domain, count = urls.len(), "discovered urls");
        Ok(urls)
    }

    async fn fetch(&self, url: &str) -> Result<String, ApiError> {
        let request = ScrapeRequest {
            url,
            formats: ["markdown"],
            only_main_content: true,
            wait_for: 2000,
            timeout: 15000,
        };

        debug!(url, "scrape request");
        let body = self.post_json("/scrape", &request).await?;
        let parsed: ScrapeResponse = serde_json::from_value(body)?;

        let content = extract_content(parsed);
        info!(url, chars = content.len(), "scraped content");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn crawl_response_with_url_objects() {
        let parsed: CrawlResponse = serde_json::from_value(json!({
            "data": [
                { "url": "https://example.com/about", "title": "About" },
                { "url": "https://example.com/team" },
            ]
        }))
        .unwrap();
        assert_eq!(
            extract_urls(parsed),
            vec!["https://example.com/about", "https://example.com/team"]
        );
    }

    #[test]
    fn crawl_response_with_plain_strings() {
        let parsed: CrawlResponse = serde_json::from_value(json!({
            "data": ["https://example.com/a", "https://example.com/b"]
        }))
        .unwrap();
        assert_eq!(
            extract_urls(parsed),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn crawl_response_with_top_level_urls() {
        let parsed: CrawlResponse = serde_json::from_value(json!({
            "urls": ["https://example.com/x"]
        }))
        .unwrap();
        assert_eq!(extract_urls(parsed), vec!["https://example.com/x"]);
    }

    #[test]
    fn crawl_response_skips_malformed_items() {
        let parsed: CrawlResponse = serde_json::from_value(json!({
            "data": [{ "title": "no url here" }, { "url": "https://example.com/y" }]
        }))
        .unwrap();
        assert_eq!(extract_urls(parsed), vec!["https://example.com/y"]);
    }

    #[test]
    fn scrape_response_prefers_markdown() {
        let parsed: ScrapeResponse = serde_json::from_value(json!({
            "data": { "markdown": "# Hello", "html": "<h1>Hello</h1>" }
        }))
        .unwrap();
        assert_eq!(extract_content(parsed), "# Hello");
    }

    #[test]
    fn scrape_response_falls_back_through_fields() {
        let parsed: ScrapeResponse = serde_json::from_value(json!({
            "data": { "markdown": "", "content": "body text" }
        }))
        .unwrap();
        assert_eq!(extract_content(parsed), "body text");
    }

    #[test]
    fn scrape_response_accepts_string_data() {
        let parsed: ScrapeResponse =
            serde_json::from_value(json!({ "data": "raw markdown" })).unwrap();
        assert_eq!(extract_content(parsed), "raw markdown");
    }

    #[test]
    fn scrape_response_accepts_top_level_content() {
        let parsed: ScrapeResponse =
            serde_json::from_value(json!({ "content": "top-level" })).unwrap();
        assert_eq!(extract_content(parsed), "top-level");
    }

    #[test]
    fn wire_error_body_is_extracted() {
        let err: WireError = serde_json::from_str(r#"{"error":"invalid api key"}"#).unwrap();
        assert_eq!(err.error, "invalid api key");
    }
}
