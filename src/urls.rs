//! URL normalization and classification utilities.
//!
//! Normalized form: lowercase scheme and host, path with the trailing slash
//! removed (except the root path), query and fragment dropped. This is the
//! canonical key for every equality comparison in the engine.

use log::warn;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::MAX_URL_LENGTH;

/// Coarse page classification, inferred from path segments when the input
/// does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Product,
    Category,
    Blog,
    Page,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Product => "product",
            PageType::Category => "category",
            PageType::Blog => "blog",
            PageType::Page => "page",
        }
    }

    /// All types, in bucket order.
    pub const ALL: [PageType; 4] = [
        PageType::Product,
        PageType::Category,
        PageType::Blog,
        PageType::Page,
    ];
}

/// A single input URL with its page classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Absolute URL with scheme and host.
    pub url: String,
    /// Supplied or inferred page type.
    pub page_type: PageType,
}

impl UrlRecord {
    /// Creates a record with the type inferred from the URL path.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let page_type = infer_type(&url);
        UrlRecord { url, page_type }
    }

    /// Creates a record with an explicit page type.
    pub fn with_type(url: impl Into<String>, page_type: PageType) -> Self {
        UrlRecord {
            url: url.into(),
            page_type,
        }
    }
}

/// Normalizes a URL to its canonical comparison form.
///
/// Lowercases the scheme and host, strips the trailing slash from non-root
/// paths, and drops query and fragment. Unparseable input falls back to a
/// trimmed, lowercased copy so callers never have to handle an error for a
/// comparison key.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("").to_lowercase();
            let port = parsed
                .port()
                .map(|p| format!(":{p}"))
                .unwrap_or_default();
            let mut path = parsed.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                path.pop();
            }
            format!("{}://{}{}{}", parsed.scheme().to_lowercase(), host, port, path)
        }
        Err(_) => raw.trim().trim_end_matches('/').to_lowercase(),
    }
}

/// Path component of a URL, trailing slash stripped (root stays `/`).
pub fn path_of(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) => {
            let mut path = parsed.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                path.pop();
            }
            path
        }
        Err(_) => "/".to_string(),
    }
}

/// Final path segment, lowercased. Empty for the root path.
pub fn slug_of(url: &str) -> String {
    let path = path_of(url);
    path.rsplit('/').next().unwrap_or("").to_lowercase()
}

/// Splits a slug on `-`, `_`, and whitespace, dropping empty tokens.
pub fn tokenize_slug(slug: &str) -> Vec<String> {
    slug.split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Infers the page type from path segments.
pub fn infer_type(url: &str) -> PageType {
    let path = path_of(url).to_lowercase();
    if path.contains("/products/") {
        PageType::Product
    } else if path.contains("/collections/") || path.contains("/category/") {
        PageType::Category
    } else if path.contains("/blog") || path.contains("/blogs/") {
        PageType::Blog
    } else {
        PageType::Page
    }
}

/// Canonicalizes a site root to `scheme://host[:port]` with no trailing
/// slash, defaulting the scheme to https when missing.
pub fn ensure_site_root(value: &str) -> String {
    let trimmed = value.trim();
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    match Url::parse(&with_scheme) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or("").to_lowercase();
            let port = parsed
                .port()
                .map(|p| format!(":{p}"))
                .unwrap_or_default();
            format!("{}://{}{}", parsed.scheme(), host, port)
        }
        Err(_) => with_scheme.trim_end_matches('/').to_string(),
    }
}

/// True when both URLs resolve to the same host (case-insensitive).
pub fn is_same_host(url: &str, base_url: &str) -> bool {
    let host = |u: &str| {
        Url::parse(u)
            .ok()
            .and_then(|p| p.host_str().map(|h| h.to_lowercase()))
    };
    match (host(url), host(base_url)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Validates an input-list URL: adds an https:// prefix when the scheme is
/// missing, rejects oversized input and non-http(s) schemes.
///
/// Returns `Some(url)` when the URL should be processed, `None` otherwise.
pub fn validate_input_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() > MAX_URL_LENGTH {
        warn!(
            "Skipping URL exceeding maximum length ({} > {})",
            trimmed.len(),
            MAX_URL_LENGTH
        );
        return None;
    }

    let normalized = if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        format!("https://{trimmed}")
    } else {
        trimmed.to_string()
    };
    if normalized.len() > MAX_URL_LENGTH {
        warn!("Skipping URL exceeding maximum length after normalization");
        return None;
    }

    match Url::parse(&normalized) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => {
                if parsed.host_str().is_some() {
                    Some(normalized)
                } else {
                    warn!("Skipping URL without a host: {url}");
                    None
                }
            }
            _ => {
                warn!("Skipping unsupported scheme for URL: {url}");
                None
            }
        },
        Err(_) => {
            warn!("Skipping invalid URL: {url}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_trailing_slash() {
        assert_eq!(
            normalize_url("https://Example.com/Products/Dress/"),
            "https://example.com/Products/Dress"
        );
    }

    #[test]
    fn test_normalize_keeps_root_slash() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_normalize_drops_query_and_fragment() {
        assert_eq!(
            normalize_url("https://example.com/a?b=1#frag"),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_normalize_lowercases_host_not_path() {
        // Path case matters to origin servers; only scheme+host fold.
        assert_eq!(
            normalize_url("HTTPS://EXAMPLE.com/About-Us"),
            "https://example.com/About-Us"
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_port() {
        assert_eq!(
            normalize_url("https://example.com:8443/x/"),
            "https://example.com:8443/x"
        );
    }

    #[test]
    fn test_path_of_root() {
        assert_eq!(path_of("https://example.com"), "/");
        assert_eq!(path_of("https://example.com/"), "/");
    }

    #[test]
    fn test_slug_of_basic() {
        assert_eq!(slug_of("https://example.com/products/Black-Dress"), "black-dress");
        assert_eq!(slug_of("https://example.com/"), "");
    }

    #[test]
    fn test_tokenize_slug_mixed_separators() {
        assert_eq!(
            tokenize_slug("black-dress_large size"),
            vec!["black", "dress", "large", "size"]
        );
        assert!(tokenize_slug("---").is_empty());
    }

    #[test]
    fn test_infer_type_buckets() {
        assert_eq!(infer_type("https://x.com/products/a"), PageType::Product);
        assert_eq!(infer_type("https://x.com/collections/a"), PageType::Category);
        assert_eq!(infer_type("https://x.com/category/a"), PageType::Category);
        assert_eq!(infer_type("https://x.com/blog/a"), PageType::Blog);
        assert_eq!(infer_type("https://x.com/blogs/a"), PageType::Blog);
        assert_eq!(infer_type("https://x.com/about"), PageType::Page);
    }

    #[test]
    fn test_ensure_site_root() {
        assert_eq!(ensure_site_root("example.com"), "https://example.com");
        assert_eq!(
            ensure_site_root("http://Example.com/some/path"),
            "http://example.com"
        );
        assert_eq!(ensure_site_root(" example.com/ "), "https://example.com");
    }

    #[test]
    fn test_is_same_host() {
        assert!(is_same_host("https://a.com/x", "http://A.COM"));
        assert!(!is_same_host("https://b.com/x", "https://a.com"));
        assert!(!is_same_host("not a url", "https://a.com"));
    }

    #[test]
    fn test_validate_input_url() {
        assert_eq!(
            validate_input_url("example.com/a"),
            Some("https://example.com/a".to_string())
        );
        assert_eq!(
            validate_input_url("http://example.com"),
            Some("http://example.com".to_string())
        );
        assert_eq!(validate_input_url(""), None);
        assert_eq!(validate_input_url("not a url at all!!!"), None);
        let long = format!("https://example.com/{}", "a".repeat(2100));
        assert_eq!(validate_input_url(&long), None);
    }

    #[test]
    fn test_url_record_infers_type() {
        let rec = UrlRecord::new("https://x.com/products/shoe");
        assert_eq!(rec.page_type, PageType::Product);
        let rec = UrlRecord::with_type("https://x.com/shoe", PageType::Product);
        assert_eq!(rec.page_type, PageType::Product);
    }

    // Property-based tests using proptest
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_normalize_idempotent(
            host in "[a-z]{3,12}\\.[a-z]{2,4}",
            path in prop::collection::vec("[a-zA-Z0-9-]{1,8}", 0..5)
        ) {
            let url = format!("https://{}/{}", host, path.join("/"));
            let once = normalize_url(&url);
            let twice = normalize_url(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_normalize_equates_trailing_slash(
            host in "[a-z]{3,12}\\.[a-z]{2,4}",
            seg in "[a-z0-9-]{1,10}"
        ) {
            let bare = format!("https://{}/{}", host, seg);
            let slashed = format!("{}/", bare);
            prop_assert_eq!(normalize_url(&bare), normalize_url(&slashed));
        }

        #[test]
        fn test_slug_tokens_never_empty_strings(slug in "[a-z0-9_\\- ]{0,30}") {
            for token in tokenize_slug(&slug) {
                prop_assert!(!token.is_empty());
            }
        }
    }
}
