//! Search-performance metric snapshots.
//!
//! A snapshot maps normalized URLs to click/impression/position figures for
//! one reporting period. Snapshots for the before and after periods are built
//! independently and never merged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::UNRANKED_POSITION;
use crate::urls::normalize_url;

/// One parsed metric row, as delivered by the input layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Page URL as reported.
    pub url: String,
    /// Total clicks in the period.
    pub clicks: f64,
    /// Total impressions in the period.
    pub impressions: f64,
    /// Average ranking position; 999 means unranked.
    pub position: f64,
}

/// Per-URL metrics inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub clicks: f64,
    pub impressions: f64,
    pub position: f64,
}

impl Default for PageMetrics {
    fn default() -> Self {
        PageMetrics {
            clicks: 0.0,
            impressions: 0.0,
            position: UNRANKED_POSITION,
        }
    }
}

/// Point-in-time map of normalized URL to page metrics.
pub type MetricSnapshot = HashMap<String, PageMetrics>;

/// Builds a snapshot keyed by normalized URL.
///
/// Rows with an empty URL are skipped. Later rows for the same normalized URL
/// overwrite earlier ones, so a report exported with duplicate rows keeps its
/// last value.
pub fn build_metric_map(records: &[MetricRecord]) -> MetricSnapshot {
    let mut map = MetricSnapshot::new();
    for record in records {
        if record.url.trim().is_empty() {
            continue;
        }
        map.insert(
            normalize_url(&record.url),
            PageMetrics {
                clicks: record.clicks,
                impressions: record.impressions,
                position: record.position,
            },
        );
    }
    map
}

/// Looks up metrics for a URL, trying the primary key first and falling back
/// to the secondary. Missing entries default to zero clicks/impressions and
/// the unranked position.
pub fn pick_metric(snapshot: &MetricSnapshot, primary_url: &str, fallback_url: &str) -> PageMetrics {
    if let Some(metrics) = snapshot.get(&normalize_url(primary_url)) {
        return *metrics;
    }
    if !fallback_url.is_empty() {
        if let Some(metrics) = snapshot.get(&normalize_url(fallback_url)) {
            return *metrics;
        }
    }
    PageMetrics::default()
}
