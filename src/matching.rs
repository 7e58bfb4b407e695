//! Old-to-new URL matching.
//!
//! Produces one [`MatchResult`] per old URL, in input order, without any
//! network I/O. Matching is tried in priority order: exact normalized URL,
//! exact path, then slug similarity restricted to same-type candidates.
//! Everything below the acceptance floor goes to manual review.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::{
    MATCH_SCORE_THRESHOLD, SLUG_ACCEPT_FLOOR, SLUG_JACCARD_WEIGHT, SLUG_SEQUENCE_WEIGHT,
};
use crate::metrics::MetricSnapshot;
use crate::metrics::pick_metric;
use crate::urls::{normalize_url, path_of, slug_of, tokenize_slug, PageType, UrlRecord};

/// How a match was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    ExactUrl,
    ExactPath,
    SlugSimilarity,
    ManualRequired,
    /// Used in site-scan mode, where discovered URLs map to themselves.
    SiteScan,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::ExactUrl => "exact_url",
            MatchReason::ExactPath => "exact_path",
            MatchReason::SlugSimilarity => "slug_similarity",
            MatchReason::ManualRequired => "manual_required",
            MatchReason::SiteScan => "site_scan",
        }
    }
}

/// One old URL mapped to its best new-URL candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub old_url: String,
    /// Empty when no candidate cleared the acceptance floor.
    pub new_url: String,
    /// Confidence, 0–100.
    pub score: u32,
    pub reason: MatchReason,
    pub page_type: PageType,
    pub old_path: String,
    pub new_path: String,
}

impl MatchResult {
    /// Builds a result row, deriving both path fields.
    pub fn new(
        old_url: &str,
        new_url: &str,
        score: u32,
        reason: MatchReason,
        page_type: PageType,
    ) -> Self {
        MatchResult {
            old_url: old_url.to_string(),
            new_url: new_url.to_string(),
            score,
            reason,
            page_type,
            old_path: path_of(old_url),
            new_path: if new_url.is_empty() {
                String::new()
            } else {
                path_of(new_url)
            },
        }
    }
}

/// Aggregate counts over a match run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub total_old_urls: usize,
    pub auto_matched: usize,
    pub manual_required: usize,
}

/// A proposed redirect, both sides path-only with a leading slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedirectPair {
    pub from: String,
    pub to: String,
}

/// A low-confidence match queued for human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewEntry {
    pub old_url: String,
    pub suggested_new_url: String,
    pub score: u32,
    pub reason: MatchReason,
}

/// A prioritized follow-up item for the report consumer.
///
/// `detail` carries the match score in migration mode and the HTTP status
/// code in site-scan mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrgentAction {
    pub old_url: String,
    pub new_url: String,
    pub detail: String,
    pub impact: f64,
    pub reason: String,
    pub cause: String,
    pub fix: String,
}

/// Character-level similarity in [0, 1] based on the longest common
/// subsequence: `2·LCS(a, b) / (|a| + |b|)`. Two empty strings are identical.
pub fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    // Rolling single-row DP keeps this O(|b|) in memory.
    let mut prev = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for &ca in &a {
        for (j, &cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut prev, &mut current);
    }
    let lcs = prev[b.len()];
    (2 * lcs) as f64 / (a.len() + b.len()) as f64
}

/// Token-set Jaccard similarity between two slugs.
fn token_jaccard(old_slug: &str, candidate_slug: &str) -> f64 {
    let old_tokens: HashSet<String> = tokenize_slug(old_slug).into_iter().collect();
    let cand_tokens: HashSet<String> = tokenize_slug(candidate_slug).into_iter().collect();
    let union = old_tokens.union(&cand_tokens).count().max(1);
    let intersection = old_tokens.intersection(&cand_tokens).count();
    intersection as f64 / union as f64
}

/// Matches every old URL against the new URL list.
///
/// Returns one result per old URL, preserving input order. Deterministic for
/// identical input: candidate iteration follows new-list order and ties keep
/// the first-seen candidate.
pub fn match_urls(old_records: &[UrlRecord], new_records: &[UrlRecord]) -> Vec<MatchResult> {
    let mut new_by_norm: HashMap<String, &str> = HashMap::new();
    let mut new_by_path: HashMap<String, &str> = HashMap::new();
    let mut new_by_type: HashMap<PageType, Vec<&str>> = PageType::ALL
        .iter()
        .map(|t| (*t, Vec::new()))
        .collect();
    let mut new_all: Vec<&str> = Vec::with_capacity(new_records.len());

    for record in new_records {
        let url = record.url.as_str();
        new_by_norm.insert(normalize_url(url), url);
        new_by_path.insert(path_of(url).to_lowercase(), url);
        new_by_type.entry(record.page_type).or_default().push(url);
        new_all.push(url);
    }

    let mut results = Vec::with_capacity(old_records.len());
    for record in old_records {
        let old_url = record.url.as_str();
        let old_type = record.page_type;

        if let Some(target) = new_by_norm.get(&normalize_url(old_url)) {
            results.push(MatchResult::new(old_url, target, 100, MatchReason::ExactUrl, old_type));
            continue;
        }

        if let Some(target) = new_by_path.get(&path_of(old_url).to_lowercase()) {
            results.push(MatchResult::new(old_url, target, 95, MatchReason::ExactPath, old_type));
            continue;
        }

        let bucket = new_by_type.get(&old_type).filter(|b| !b.is_empty());
        let candidates: &[&str] = match bucket {
            Some(bucket) => bucket,
            None => &new_all,
        };

        let old_slug = slug_of(old_url);
        let mut best_target: Option<&str> = None;
        let mut best_score = 0.0f64;
        for candidate in candidates {
            let cand_slug = slug_of(candidate);
            let combined = SLUG_SEQUENCE_WEIGHT * lcs_ratio(&old_slug, &cand_slug)
                + SLUG_JACCARD_WEIGHT * token_jaccard(&old_slug, &cand_slug);
            if combined > best_score {
                best_score = combined;
                best_target = Some(candidate);
            }
        }

        let percent = (best_score * 100.0).round() as u32;
        match best_target {
            Some(target) if percent >= SLUG_ACCEPT_FLOOR => {
                results.push(MatchResult::new(
                    old_url,
                    target,
                    percent,
                    MatchReason::SlugSimilarity,
                    old_type,
                ));
            }
            _ => {
                results.push(MatchResult::new(
                    old_url,
                    "",
                    0,
                    MatchReason::ManualRequired,
                    old_type,
                ));
            }
        }
    }

    results
}

/// Counts auto-matched vs manual-review results.
pub fn summarize_matches(matches: &[MatchResult], score_threshold: u32) -> MatchSummary {
    let total = matches.len();
    let auto_matched = matches.iter().filter(|m| m.score >= score_threshold).count();
    MatchSummary {
        total_old_urls: total,
        auto_matched,
        manual_required: total - auto_matched,
    }
}

/// Builds deduplicated redirect pairs from matches at or above the threshold.
///
/// Pairs whose source and target paths are identical are skipped; both sides
/// are forced to start with `/`.
pub fn build_redirect_pairs(matches: &[MatchResult], score_threshold: u32) -> Vec<RedirectPair> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut pairs = Vec::new();
    for item in matches {
        if item.score < score_threshold {
            continue;
        }
        let source = lead_slash(&item.old_path);
        let target = lead_slash(&item.new_path);
        if source == target {
            continue;
        }
        let key = (source.clone(), target.clone());
        if !seen.insert(key) {
            continue;
        }
        pairs.push(RedirectPair {
            from: source,
            to: target,
        });
    }
    pairs
}

fn lead_slash(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Collects matches below the threshold for human review.
pub fn build_manual_review(matches: &[MatchResult], score_threshold: u32) -> Vec<ManualReviewEntry> {
    matches
        .iter()
        .filter(|m| m.score < score_threshold)
        .map(|m| ManualReviewEntry {
            old_url: m.old_url.clone(),
            suggested_new_url: m.new_url.clone(),
            score: m.score,
            reason: m.reason,
        })
        .collect()
}

/// Ranks matches by estimated traffic impact, highest first, top 20.
///
/// Impact = 2·clicks + 0.1·impressions + max(0, 50 − position), with +25 for
/// below-threshold matches and +25 for unmatched URLs.
pub fn rank_urgent_actions(matches: &[MatchResult], before: &MetricSnapshot) -> Vec<UrgentAction> {
    let mut ranked: Vec<UrgentAction> = matches
        .iter()
        .map(|item| {
            let metrics = pick_metric(before, &item.old_url, "");
            let position_bonus = (50.0 - metrics.position).max(0.0);
            let mut impact = metrics.clicks * 2.0 + metrics.impressions * 0.1 + position_bonus;
            if item.score < MATCH_SCORE_THRESHOLD {
                impact += 25.0;
            }
            if item.new_url.is_empty() {
                impact += 25.0;
            }
            UrgentAction {
                old_url: item.old_url.clone(),
                new_url: item.new_url.clone(),
                detail: item.score.to_string(),
                impact: (impact * 100.0).round() / 100.0,
                reason: item.reason.as_str().to_string(),
                cause: String::new(),
                fix: String::new(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.impact.partial_cmp(&a.impact).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(20);
    ranked
}
