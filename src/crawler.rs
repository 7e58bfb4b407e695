//! Site discovery: sitemap traversal plus internal-link crawl.
//!
//! Used when no new-URL list is supplied. Phase one walks `sitemap.xml` and
//! any nested sitemap indices; phase two runs a same-host breadth-first crawl
//! from the site root, only when the sitemap phase leaves the cap unfilled.
//! Every fetch failure is non-fatal: an unreachable page is simply excluded.
//! Crawl order depends on the live site, so output determinism is
//! best-effort only.

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::config::{CRAWL_FRONTIER_FACTOR, EXCLUDED_EXTENSIONS, EXCLUDED_PATH_PARTS};
use crate::error::FetchStats;
use crate::urls::{ensure_site_root, is_same_host, normalize_url};

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").expect("Failed to parse anchor selector - this is a bug")
});

// Sitemaps in the wild are frequently malformed; a tolerant text scan
// survives where a strict XML parser gives up.
static LOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<loc>(.*?)</loc>").expect("loc pattern is valid - this is a bug")
});

/// Discovers up to `cap` candidate URLs for a site.
///
/// Output is deduplicated (first occurrence wins) and never exceeds `cap`.
pub async fn discover_site_urls(
    client: &reqwest::Client,
    site_url: &str,
    cap: usize,
    stats: &FetchStats,
) -> Vec<String> {
    let base = ensure_site_root(site_url);
    let mut discovered: Vec<String> = Vec::new();

    for url in fetch_sitemap_urls(client, &base, stats).await {
        if is_same_host(&url, &base) && should_include_url(&url) {
            discovered.push(url);
        }
        if discovered.len() >= cap {
            break;
        }
    }

    if discovered.len() >= cap {
        return dedupe_preserving(discovered, cap);
    }

    let crawled = crawl_internal_links(client, &base, cap, stats).await;
    discovered.extend(crawled);
    dedupe_preserving(discovered, cap)
}

/// Walks `{base}/sitemap.xml` breadth-first, following nested sitemap index
/// entries (`<loc>` values ending in `.xml`). A visited-set keyed by the raw
/// sitemap URL guards against cyclic indices. Unreachable or non-2xx
/// sitemaps are skipped silently.
pub async fn fetch_sitemap_urls(
    client: &reqwest::Client,
    base_url: &str,
    stats: &FetchStats,
) -> Vec<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::from([format!("{base_url}/sitemap.xml")]);
    let mut found: Vec<String> = Vec::new();

    while let Some(sitemap_url) = queue.pop_front() {
        if !visited.insert(sitemap_url.clone()) {
            continue;
        }

        let body = match client.get(&sitemap_url).send().await {
            Ok(response) if response.status().as_u16() < 400 => {
                response.text().await.unwrap_or_default()
            }
            Ok(_) => continue,
            Err(e) => {
                stats.record(&e);
                continue;
            }
        };

        for raw in scan_sitemap_locs(&body) {
            if raw.ends_with(".xml") {
                queue.push_back(raw);
            } else if raw.starts_with("http://") || raw.starts_with("https://") {
                found.push(raw);
            }
        }
    }

    dedupe_preserving(found, usize::MAX)
}

/// Extracts trimmed `<loc>` values from sitemap text.
pub fn scan_sitemap_locs(body: &str) -> Vec<String> {
    LOC_RE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Breadth-first internal-link crawl from the site root.
///
/// Only same-host pages (compared after redirect resolution) are followed.
/// A page must pass the inclusion filter to be *collected*, but its links
/// are followed either way. The frontier is truncated at
/// `cap * CRAWL_FRONTIER_FACTOR` so heavily interlinked sites cannot grow
/// the queue without bound.
pub async fn crawl_internal_links(
    client: &reqwest::Client,
    base_url: &str,
    cap: usize,
    stats: &FetchStats,
) -> Vec<String> {
    let mut queue: VecDeque<String> = VecDeque::from([base_url.to_string()]);
    let mut visited: HashSet<String> = HashSet::new();
    let mut found: Vec<String> = Vec::new();
    let frontier_cap = cap.saturating_mul(CRAWL_FRONTIER_FACTOR);

    while let Some(current) = queue.pop_front() {
        if found.len() >= cap {
            break;
        }
        if !visited.insert(normalize_url(&current)) {
            continue;
        }

        let response = match client.get(&current).send().await {
            Ok(response) => response,
            Err(e) => {
                stats.record(&e);
                continue;
            }
        };

        let final_url = response.url().to_string();
        if !is_same_host(&final_url, base_url) {
            continue;
        }
        if response.status().as_u16() >= 400 {
            continue;
        }

        // Mark the post-redirect URL too, so both spellings of a page count
        // as one visit.
        visited.insert(normalize_url(&final_url));
        if should_include_url(&final_url) {
            found.push(final_url.clone());
        }

        let body = response.text().await.unwrap_or_default();
        for link in extract_html_links(&body, &final_url) {
            if !is_same_host(&link, base_url) {
                continue;
            }
            if !should_include_url(&link) {
                continue;
            }
            if visited.contains(&normalize_url(&link)) {
                continue;
            }
            queue.push_back(link);
            if queue.len() > frontier_cap {
                queue.truncate(frontier_cap);
            }
        }
    }

    dedupe_preserving(found, cap)
}

/// Extracts absolute outbound links from a page.
///
/// Relative hrefs are resolved against the page URL; fragments are dropped;
/// anchor-only, javascript:, mailto:, and tel: links are ignored.
pub fn extract_html_links(html: &str, page_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let base = match Url::parse(page_url) {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };

    let mut links = Vec::new();
    for element in document.select(&LINK_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let trimmed = href.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        if lower.starts_with('#')
            || lower.starts_with("javascript:")
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
        {
            continue;
        }
        let Ok(mut absolute) = base.join(trimmed) else {
            continue;
        };
        absolute.set_fragment(None);
        match absolute.scheme() {
            "http" | "https" => links.push(absolute.to_string()),
            _ => {}
        }
    }
    links
}

/// Inclusion filter for discovered URLs: rejects asset extensions and
/// excluded path segments.
pub fn should_include_url(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => return false,
    };

    for part in EXCLUDED_PATH_PARTS {
        if path.contains(part) {
            return false;
        }
    }
    for ext in EXCLUDED_EXTENSIONS {
        if path.ends_with(ext) {
            return false;
        }
    }
    true
}

fn dedupe_preserving(urls: Vec<String>, cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| seen.insert(u.clone()))
        .take(cap)
        .collect()
}
