//! End-to-end analysis pipeline.
//!
//! Runs validation, discovery, matching, audit, and comparison as sequential
//! stages. The cancellation token is checked at every stage boundary and
//! between audit batches, never mid-fetch; a cancelled run surfaces as
//! [`AnalysisError::Cancelled`] with no partial output.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::audit::{
    annotate_audit_results, build_audit_urgent_actions, check_robots_and_sitemap, run_quick_audit,
    sort_audit_results, AuditResult, Severity,
};
use crate::compare::{
    build_comparison_rows, build_recovery_panel, ComparisonRow, RecoveryPanelEntry, UnresolvedRow,
};
use crate::config::{
    AUDIT_BATCH_SIZE, AUDIT_LIMIT_MAX, AUDIT_LIMIT_MIN, AUDIT_WORKERS, CRAWL_LIMIT_MAX,
    CRAWL_LIMIT_MIN, FETCH_TIMEOUT, MATCH_SCORE_THRESHOLD, USER_AGENT,
};
use crate::crawler::discover_site_urls;
use crate::error::{AnalysisError, FetchStats};
use crate::matching::{
    build_manual_review, build_redirect_pairs, match_urls, rank_urgent_actions, summarize_matches,
    ManualReviewEntry, MatchReason, MatchResult, MatchSummary, RedirectPair, UrgentAction,
};
use crate::metrics::{build_metric_map, MetricRecord};
use crate::urls::{infer_type, validate_input_url, UrlRecord};

// Stage-boundary progress marks. The audit stage interpolates between
// AUDIT_START and AUDIT_END per batch.
const PROGRESS_VALIDATED: u8 = 10;
const PROGRESS_DISCOVERED: u8 = 20;
const PROGRESS_MATCHED: u8 = 45;
const PROGRESS_AUDIT_START: u8 = 70;
const PROGRESS_AUDIT_END: u8 = 88;
const PROGRESS_COMPARING: u8 = 90;

/// Which kind of analysis is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Old URL list vs new URL list (or crawl-discovered new URLs).
    Migration,
    /// No old list: the live site is discovered and audited as-is.
    Scan,
}

/// Everything a single analysis run needs, already parsed.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub old_urls: Vec<String>,
    pub new_urls: Vec<String>,
    pub gsc_before: Vec<MetricRecord>,
    pub gsc_after: Vec<MetricRecord>,
    pub site_url: String,
    pub crawl: bool,
    pub crawl_limit: usize,
    pub audit: bool,
    pub audit_limit: usize,
}

/// Shared clients and counters for one or more runs.
pub struct PipelineContext {
    pub client: Arc<reqwest::Client>,
    pub fetch_stats: Arc<FetchStats>,
}

impl PipelineContext {
    /// Builds the shared HTTP client. Redirects are followed (reqwest's
    /// default limit of 10) because every classifier works on the final URL.
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(PipelineContext {
            client: Arc::new(client),
            fetch_stats: Arc::new(FetchStats::new()),
        })
    }
}

/// Complete output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisPackage {
    pub mode: AnalysisMode,
    pub matches: Vec<MatchResult>,
    pub summary: MatchSummary,
    pub redirects: Vec<RedirectPair>,
    pub manual_review: Vec<ManualReviewEntry>,
    pub comparison: Vec<ComparisonRow>,
    pub unresolved: Vec<UnresolvedRow>,
    pub recovery_panel: Vec<RecoveryPanelEntry>,
    pub urgent_actions: Vec<UrgentAction>,
    pub audit_results: Vec<AuditResult>,
    /// Count of critical audit findings, including site-level checks.
    pub critical_issues: usize,
}

/// Callback invoked at stage boundaries with (percent, stage label).
///
/// The lifetime parameter lets callers pass closures that borrow local
/// state, such as a job store.
pub type ProgressFn<'a> = dyn Fn(u8, &str) + Send + Sync + 'a;

fn ensure_live(cancel: &CancellationToken) -> Result<(), AnalysisError> {
    if cancel.is_cancelled() {
        Err(AnalysisError::Cancelled)
    } else {
        Ok(())
    }
}

/// Clamps a caller-supplied cap into its inclusive bounds.
pub fn clamp_limit(value: usize, min: usize, max: usize) -> usize {
    value.clamp(min, max)
}

/// Progress percentage for finishing `completed` of `total` audit batches.
pub fn audit_progress(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return PROGRESS_AUDIT_END;
    }
    let span = (PROGRESS_AUDIT_END - PROGRESS_AUDIT_START) as usize;
    PROGRESS_AUDIT_START + (span * completed.min(total) / total) as u8
}

/// Sanitizes a raw URL list: trims, prefixes missing schemes, drops
/// oversized or unparseable entries.
pub fn sanitize_url_list(raw: &[String]) -> Vec<String> {
    raw.iter()
        .filter_map(|u| validate_input_url(u))
        .collect()
}

/// Decides the analysis mode and collects every validation problem.
///
/// Returns the mode on success; on failure, all problems at once so the
/// caller never fixes inputs one message at a time.
pub fn validate_input(input: &AnalysisInput) -> Result<AnalysisMode, Vec<String>> {
    let mut messages = Vec::new();
    let has_old = !sanitize_url_list(&input.old_urls).is_empty();
    let has_site = !input.site_url.trim().is_empty();

    let mode = if has_old {
        AnalysisMode::Migration
    } else {
        AnalysisMode::Scan
    };

    match mode {
        AnalysisMode::Migration => {
            let has_new = !sanitize_url_list(&input.new_urls).is_empty();
            if !has_new && !(input.crawl && has_site) {
                messages.push(
                    "New URL list is empty and no site URL was given to crawl.".to_string(),
                );
            }
            if input.crawl && !has_site {
                messages.push("Crawling requires a site URL.".to_string());
            }
        }
        AnalysisMode::Scan => {
            if !has_site {
                messages.push(
                    "Either an old URL list or a site URL must be provided.".to_string(),
                );
            }
        }
    }

    if messages.is_empty() {
        Ok(mode)
    } else {
        Err(messages)
    }
}

/// Runs one complete analysis.
///
/// Stage order is fixed: validate, discover, match, audit, compare. Audit
/// runs in batches of [`AUDIT_BATCH_SIZE`] so cancellation latency stays
/// bounded even for large URL sets.
pub async fn perform_analysis(
    ctx: &PipelineContext,
    input: AnalysisInput,
    cancel: &CancellationToken,
    progress: &ProgressFn<'_>,
) -> Result<AnalysisPackage, AnalysisError> {
    let mode = validate_input(&input).map_err(AnalysisError::validation)?;
    ensure_live(cancel)?;
    progress(PROGRESS_VALIDATED, "Inputs validated");

    let crawl_limit = clamp_limit(input.crawl_limit, CRAWL_LIMIT_MIN, CRAWL_LIMIT_MAX);
    let audit_limit = clamp_limit(input.audit_limit, AUDIT_LIMIT_MIN, AUDIT_LIMIT_MAX);

    let old_urls = sanitize_url_list(&input.old_urls);
    let mut new_urls = sanitize_url_list(&input.new_urls);

    // Discovery stage: crawl when the new list is missing or scan mode asks
    // for it.
    if (mode == AnalysisMode::Scan || (input.crawl && new_urls.is_empty()))
        && !input.site_url.trim().is_empty()
    {
        new_urls = discover_site_urls(&ctx.client, &input.site_url, crawl_limit, &ctx.fetch_stats)
            .await;
        log::info!("Discovered {} URLs from the site", new_urls.len());
    }
    // A scan of a site that yields nothing is an input problem, not an
    // empty report.
    if mode == AnalysisMode::Scan && new_urls.is_empty() {
        return Err(AnalysisError::validation(vec![
            "No URLs could be discovered from the site. Check the domain, its sitemap.xml, and that the homepage is reachable.".to_string(),
        ]));
    }
    ensure_live(cancel)?;
    progress(PROGRESS_DISCOVERED, "New URL set ready");

    // Matching stage.
    let matches = match mode {
        AnalysisMode::Migration => {
            let old_records: Vec<UrlRecord> = old_urls.iter().map(UrlRecord::new).collect();
            let new_records: Vec<UrlRecord> = new_urls.iter().map(UrlRecord::new).collect();
            match_urls(&old_records, &new_records)
        }
        AnalysisMode::Scan => new_urls
            .iter()
            .map(|url| MatchResult::new(url, url, 100, MatchReason::SiteScan, infer_type(url)))
            .collect(),
    };
    let summary = summarize_matches(&matches, MATCH_SCORE_THRESHOLD);
    let redirects = match mode {
        AnalysisMode::Migration => build_redirect_pairs(&matches, MATCH_SCORE_THRESHOLD),
        AnalysisMode::Scan => Vec::new(),
    };
    let manual_review = match mode {
        AnalysisMode::Migration => build_manual_review(&matches, MATCH_SCORE_THRESHOLD),
        AnalysisMode::Scan => Vec::new(),
    };
    ensure_live(cancel)?;
    progress(PROGRESS_MATCHED, "URLs matched");

    // Audit stage. Scan mode is an audit by definition, so the flag is
    // implied there.
    let audit_enabled = input.audit || mode == AnalysisMode::Scan;
    let mut audit_results: Vec<AuditResult> = Vec::new();
    if audit_enabled {
        if !input.site_url.trim().is_empty() {
            let site_checks =
                check_robots_and_sitemap(&ctx.client, &input.site_url, &ctx.fetch_stats).await;
            audit_results.extend(site_checks);
        }
        ensure_live(cancel)?;

        let targets: Vec<String> = new_urls.iter().take(audit_limit).cloned().collect();
        let total_batches = targets.len().div_ceil(AUDIT_BATCH_SIZE);
        for (index, batch) in targets.chunks(AUDIT_BATCH_SIZE).enumerate() {
            ensure_live(cancel)?;
            let batch_results =
                run_quick_audit(&ctx.client, batch, AUDIT_WORKERS, &ctx.fetch_stats).await;
            audit_results.extend(batch_results);
            progress(
                audit_progress(index + 1, total_batches),
                "Auditing new URLs",
            );
        }
        sort_audit_results(&mut audit_results);
        audit_results = annotate_audit_results(audit_results);
    }
    ensure_live(cancel)?;
    progress(PROGRESS_COMPARING, "Comparing performance");

    // Comparison stage. CPU-only from here.
    let before = build_metric_map(&input.gsc_before);
    let after = build_metric_map(&input.gsc_after);
    let score_threshold = match mode {
        AnalysisMode::Migration => Some(MATCH_SCORE_THRESHOLD),
        AnalysisMode::Scan => None,
    };
    let (comparison, unresolved) =
        build_comparison_rows(&matches, &before, &after, score_threshold);
    let recovery_panel = build_recovery_panel(&comparison);

    let urgent_actions = match mode {
        AnalysisMode::Migration => rank_urgent_actions(&matches, &before),
        AnalysisMode::Scan => build_audit_urgent_actions(&audit_results),
    };

    let critical_issues = audit_results
        .iter()
        .filter(|r| r.severity == Severity::Critical)
        .count();

    Ok(AnalysisPackage {
        mode,
        matches,
        summary,
        redirects,
        manual_review,
        comparison,
        unresolved,
        recovery_panel,
        urgent_actions,
        audit_results,
        critical_issues,
    })
}
