//! Technical audit of candidate URLs.
//!
//! Each URL is fetched once (redirects followed, fixed timeout) and
//! classified for indexing blockers. Transport failures never abort a batch;
//! they become critical entries for that URL alone. Fetches run concurrently
//! under a semaphore-bounded worker pool; completion order is irrelevant
//! because results are re-sorted by severity and URL at the end.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::LazyLock;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::FetchStats;
use crate::matching::UrgentAction;
use crate::urls::{ensure_site_root, normalize_url};

/// Audit outcome tier. Drives display ordering and urgency ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Sort rank: critical first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// Issue tags attached to an audited URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Issue {
    #[serde(rename = "404")]
    NotFound,
    #[serde(rename = "5xx")]
    ServerError,
    #[serde(rename = "4xx")]
    ClientError,
    #[serde(rename = "noindex")]
    Noindex,
    #[serde(rename = "canonical_mismatch")]
    CanonicalMismatch,
    #[serde(rename = "redirected")]
    Redirected,
    #[serde(rename = "request_error")]
    RequestError,
    #[serde(rename = "erisim_hatasi")]
    AccessError,
}

impl Issue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Issue::NotFound => "404",
            Issue::ServerError => "5xx",
            Issue::ClientError => "4xx",
            Issue::Noindex => "noindex",
            Issue::CanonicalMismatch => "canonical_mismatch",
            Issue::Redirected => "redirected",
            Issue::RequestError => "request_error",
            Issue::AccessError => "erisim_hatasi",
        }
    }
}

/// Result of auditing one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub url: String,
    /// HTTP status as a string; `"0"` means the request never completed.
    pub status_code: String,
    pub severity: Severity,
    /// Issue tags in detection order.
    pub issues: Vec<Issue>,
    /// Free-form detail, e.g. the truncated transport error message.
    pub detail: String,
    /// Canonical link target, when the page declares one.
    pub canonical: String,
    /// URL after redirect resolution; empty on transport failure.
    pub final_url: String,
    /// Set for site-level checks (`robots.txt` / `sitemap.xml`).
    pub check: Option<String>,
    /// Advisory diagnosis, attached by [`annotate_audit_results`].
    pub cause: String,
    /// Advisory remediation, attached by [`annotate_audit_results`].
    pub fix: String,
}

impl AuditResult {
    fn empty(url: &str) -> Self {
        AuditResult {
            url: url.to_string(),
            status_code: "0".to_string(),
            severity: Severity::Info,
            issues: Vec::new(),
            detail: String::new(),
            canonical: String::new(),
            final_url: String::new(),
            check: None,
            cause: String::new(),
            fix: String::new(),
        }
    }

    /// True when any issue matches the tag.
    pub fn has_issue(&self, issue: Issue) -> bool {
        self.issues.contains(&issue)
    }
}

// Tolerant regex scans; attribute order varies too much in the wild for
// strict structural matching to be reliable here.
static NOINDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name=["']robots["'][^>]*noindex"#)
        .expect("noindex pattern is valid - this is a bug")
});

static CANONICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link[^>]+rel=["']canonical["'][^>]+href=["']([^"']+)["']"#)
        .expect("canonical pattern is valid - this is a bug")
});

/// Detects a robots-meta noindex directive.
pub fn contains_noindex(html: &str) -> bool {
    NOINDEX_RE.is_match(html)
}

/// Extracts the canonical link target, if declared.
pub fn extract_canonical(html: &str) -> Option<String> {
    CANONICAL_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Maps issue tags to a severity tier.
pub fn classify_severity(issues: &[Issue]) -> Severity {
    let critical = [Issue::ServerError, Issue::NotFound, Issue::RequestError];
    let warning = [Issue::ClientError, Issue::Noindex, Issue::CanonicalMismatch];
    if issues.iter().any(|i| critical.contains(i)) {
        Severity::Critical
    } else if issues.iter().any(|i| warning.contains(i)) {
        Severity::Warning
    } else {
        Severity::Info
    }
}

/// Fetches and classifies a single URL. Never fails: transport errors are
/// returned as critical results.
pub async fn audit_single_url(
    client: &reqwest::Client,
    url: &str,
    stats: &FetchStats,
) -> AuditResult {
    let mut result = AuditResult::empty(url);

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            stats.record(&e);
            result.severity = Severity::Critical;
            result.issues.push(Issue::RequestError);
            result.detail = truncate_error(&e);
            return result;
        }
    };

    let status = response.status();
    let final_url = response.url().to_string();
    let html = response.text().await.unwrap_or_default();

    let mut issues = Vec::new();
    if status.as_u16() == 404 {
        issues.push(Issue::NotFound);
    } else if status.as_u16() >= 500 {
        issues.push(Issue::ServerError);
    } else if status.as_u16() >= 400 {
        issues.push(Issue::ClientError);
    }

    if contains_noindex(&html) {
        issues.push(Issue::Noindex);
    }

    if let Some(canonical) = extract_canonical(&html) {
        if normalize_url(&canonical) != normalize_url(&final_url) {
            issues.push(Issue::CanonicalMismatch);
        }
        result.canonical = canonical;
    }

    if normalize_url(url) != normalize_url(&final_url) {
        issues.push(Issue::Redirected);
    }

    result.status_code = status.as_u16().to_string();
    result.severity = classify_severity(&issues);
    result.issues = issues;
    result.final_url = final_url;
    result
}

fn truncate_error(error: &reqwest::Error) -> String {
    let text = error.to_string();
    text.chars().take(100).collect()
}

/// Audits a batch of URLs with bounded concurrency.
///
/// Duplicates are collapsed before fetching (first occurrence wins). Output
/// carries exactly one entry per unique URL, sorted by severity rank then
/// URL.
pub async fn run_quick_audit(
    client: &Arc<reqwest::Client>,
    urls: &[String],
    max_workers: usize,
    stats: &Arc<FetchStats>,
) -> Vec<AuditResult> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = urls
        .iter()
        .filter(|u| seen.insert(u.as_str()))
        .cloned()
        .collect();

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = FuturesUnordered::new();
    for url in unique {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                log::warn!("Audit semaphore closed, skipping URL: {url}");
                continue;
            }
        };
        let client = Arc::clone(client);
        let stats = Arc::clone(stats);
        tasks.push(tokio::spawn(async move {
            let _permit = permit;
            audit_single_url(&client, &url, &stats).await
        }));
    }

    let mut results = Vec::new();
    while let Some(task_result) = tasks.next().await {
        match task_result {
            Ok(result) => results.push(result),
            Err(join_error) => log::warn!("Audit task panicked: {join_error:?}"),
        }
    }

    sort_audit_results(&mut results);
    results
}

/// Sorts results by (severity rank ascending, URL ascending).
pub fn sort_audit_results(results: &mut [AuditResult]) {
    results.sort_by(|a, b| {
        a.severity
            .rank()
            .cmp(&b.severity.rank())
            .then_with(|| a.url.cmp(&b.url))
    });
}

/// Site-level reachability check for `robots.txt` and `sitemap.xml`.
///
/// Any status >= 400 or transport failure is critical; these files gate
/// everything else a search engine does with the site.
pub async fn check_robots_and_sitemap(
    client: &reqwest::Client,
    site_url: &str,
    stats: &FetchStats,
) -> Vec<AuditResult> {
    let root = ensure_site_root(site_url);
    let targets = [
        ("robots.txt", format!("{root}/robots.txt")),
        ("sitemap.xml", format!("{root}/sitemap.xml")),
    ];

    let mut checks = Vec::with_capacity(targets.len());
    for (label, url) in targets {
        let mut result = AuditResult::empty(&url);
        result.check = Some(label.to_string());
        match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                result.status_code = status.to_string();
                if status >= 400 {
                    result.severity = Severity::Critical;
                    result.issues.push(Issue::AccessError);
                } else {
                    result.severity = Severity::Info;
                }
            }
            Err(e) => {
                stats.record(&e);
                result.severity = Severity::Critical;
                result.issues.push(Issue::RequestError);
                result.detail = truncate_error(&e);
            }
        }
        checks.push(result);
    }
    checks
}

/// Attaches a human-readable (cause, fix) pair to every result.
///
/// Advisory text for the report consumer only; nothing downstream computes
/// on it.
pub fn annotate_audit_results(results: Vec<AuditResult>) -> Vec<AuditResult> {
    results
        .into_iter()
        .map(|mut item| {
            let (cause, fix) = diagnose_issue(&item);
            item.cause = cause;
            item.fix = fix;
            item
        })
        .collect()
}

/// Picks the dominant problem by fixed priority and describes it.
fn diagnose_issue(item: &AuditResult) -> (String, String) {
    if item.has_issue(Issue::RequestError) {
        return (
            "The server could not be reached or the request timed out.".to_string(),
            "Check domain, DNS, and SSL reachability and that hosting is active, then rescan."
                .to_string(),
        );
    }
    if item.has_issue(Issue::NotFound) {
        if item.url.ends_with("/sitemap.xml") {
            return (
                "The sitemap file is missing.".to_string(),
                "Set the correct primary domain, verify /sitemap.xml opens, and resubmit it in Search Console."
                    .to_string(),
            );
        }
        return (
            "The URL was not found (404).".to_string(),
            "Add a 301 redirect if the page moved, or republish it if it was removed by mistake."
                .to_string(),
        );
    }
    if item.has_issue(Issue::ServerError) {
        return (
            "The server returned a 5xx error.".to_string(),
            "Check hosting logs, fix the application or theme error, and retest the URL.".to_string(),
        );
    }
    if item.has_issue(Issue::Noindex) {
        return (
            "The page carries a noindex directive and is closed to search engines.".to_string(),
            "Remove the noindex from the robots meta tag or HTTP header, then request reindexing."
                .to_string(),
        );
    }
    if item.has_issue(Issue::CanonicalMismatch) {
        return (
            "The canonical tag points at a different URL.".to_string(),
            "Update the canonical tag to this page's final URL.".to_string(),
        );
    }
    if item.status_code.starts_with('4') {
        return (
            "A client error (4xx) occurred.".to_string(),
            "Check the URL spelling, access rules, and redirects.".to_string(),
        );
    }
    if item.status_code.starts_with('5') {
        return (
            "The server failed to respond (5xx).".to_string(),
            "Check server logs and application errors, then redeploy.".to_string(),
        );
    }
    ("No issue detected.".to_string(), "No action needed.".to_string())
}

/// Ranks audit findings by severity and issue weight, top 20. Used in
/// site-scan mode where no match-based ranking exists.
pub fn build_audit_urgent_actions(results: &[AuditResult]) -> Vec<UrgentAction> {
    let mut scored: Vec<UrgentAction> = results
        .iter()
        .map(|item| {
            let severity_points = match item.severity {
                Severity::Critical => 100.0,
                Severity::Warning => 60.0,
                Severity::Info => 20.0,
            };
            let mut issue_points = 0.0;
            if item.has_issue(Issue::NotFound) {
                issue_points += 30.0;
            }
            if item.has_issue(Issue::ServerError) {
                issue_points += 40.0;
            }
            if item.has_issue(Issue::Noindex) {
                issue_points += 25.0;
            }
            if item.has_issue(Issue::CanonicalMismatch) {
                issue_points += 15.0;
            }
            if item.has_issue(Issue::RequestError) {
                issue_points += 35.0;
            }
            let reason = if item.issues.is_empty() {
                "ok".to_string()
            } else {
                item.issues
                    .iter()
                    .map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            UrgentAction {
                old_url: item.url.clone(),
                new_url: item.final_url.clone(),
                detail: item.status_code.clone(),
                impact: severity_points + issue_points,
                reason,
                cause: item.cause.clone(),
                fix: item.fix.clone(),
            }
        })
        .collect();

    scored.sort_by(|a, b| b.impact.partial_cmp(&a.impact).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(20);
    scored
}
