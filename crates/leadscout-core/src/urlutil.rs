//! URL normalization and domain helpers for discovery output.

use url::Url;

use crate::error::ApiError;

/// Normalize a user- or API-supplied URL.
///
/// Defaults the scheme to `https://` when absent, rejects non-http(s)
/// schemes, and strips the fragment. Returns the parsed URL so callers can
/// inspect host/path without reparsing.
pub fn normalize(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidUrl("empty URL".into()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url =
        Url::parse(&candidate).map_err(|e| ApiError::InvalidUrl(format!("{trimmed}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ApiError::InvalidUrl(format!(
                "scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    if url.host_str().is_none() {
        return Err(ApiError::InvalidUrl(format!("{trimmed}: no host")));
    }

    url.set_fragment(None);
    Ok(url)
}

/// Host of a URL with any leading `www.` stripped, lowercased.
pub fn domain_of(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.to_ascii_lowercase().trim_start_matches("www.").to_string())
}

/// Whether two URLs point at the same site (www-insensitive host match).
pub fn is_same_domain(a: &Url, b: &Url) -> bool {
    match (domain_of(a), domain_of(b)) {
        (Some(da), Some(db)) => da == db,
        _ => false,
    }
}

/// Deduplicate URLs preserving discovery order.
///
/// Near-duplicates collapse: trailing slash, fragment, and http/https
/// differences all map to the same key; the first spelling wins.
pub fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for url in urls {
        let key = url
            .to_ascii_lowercase()
            .replacen("https://", "http://", 1)
            .split(['#', '?'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();
        if seen.insert(key) {
            unique.push(url);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_scheme() {
        let url = normalize("example.com/about").unwrap();
        assert_eq!(url.as_str(), "https://example.com/about");
    }

    #[test]
    fn normalize_strips_fragment() {
        let url = normalize("https://example.com/page#section").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
        assert!(normalize("file:///etc/passwd").is_err());
        assert!(normalize("javascript://alert(1)").is_err());
    }

    #[test]
    fn same_domain_ignores_www() {
        let a = normalize("https://www.example.com/about").unwrap();
        let b = normalize("https://example.com/team").unwrap();
        assert!(is_same_domain(&a, &b));

        let c = normalize("https://other.com").unwrap();
        assert!(!is_same_domain(&a, &c));
    }

    #[test]
    fn dedup_collapses_near_duplicates() {
        let urls = vec![
            "https://example.com/about".to_string(),
            "https://example.com/about/".to_string(),
            "http://example.com/about".to_string(),
            "https://example.com/about#team".to_string(),
            "https://example.com/services".to_string(),
        ];
        let unique = dedup_preserving_order(urls);
        assert_eq!(
            unique,
            vec![
                "https://example.com/about".to_string(),
                "https://example.com/services".to_string(),
            ]
        );
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let urls = vec![
            "https://example.com/b".to_string(),
            "https://example.com/a".to_string(),
            "https://example.com/b/".to_string(),
        ];
        let unique = dedup_preserving_order(urls);
        assert_eq!(unique[0], "https://example.com/b");
        assert_eq!(unique[1], "https://example.com/a");
    }
}
