//! Before/after performance comparison and recovery projection.
//!
//! Consumes matches plus two metric snapshots and classifies how each
//! migrated URL is recovering. The projection panel is an optimistic
//! heuristic (base rate plus fixed bonuses), not a statistical forecast.

use serde::{Deserialize, Serialize};

use crate::config::RECOVERY_BONUSES;
use crate::matching::{MatchReason, MatchResult};
use crate::metrics::{pick_metric, MetricSnapshot, PageMetrics};

/// Classification of a migrated URL's performance trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryStatus {
    /// The pairing itself is unverified; metric comparison is meaningless.
    #[serde(rename = "manual_gerekli")]
    ManualGerekli,
    /// New organic traffic where there was none before.
    #[serde(rename = "yeni_toparlaniyor")]
    YeniToparlaniyor,
    /// Clicks roughly retained, or position not meaningfully worse.
    #[serde(rename = "toparlaniyor")]
    Toparlaniyor,
    /// Technically fixed but not yet recovering.
    #[serde(rename = "duzeltildi_ama_toparlanmadi")]
    DuzeltildiAmaToparlanmadi,
}

impl RecoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStatus::ManualGerekli => "manual_gerekli",
            RecoveryStatus::YeniToparlaniyor => "yeni_toparlaniyor",
            RecoveryStatus::Toparlaniyor => "toparlaniyor",
            RecoveryStatus::DuzeltildiAmaToparlanmadi => "duzeltildi_ama_toparlanmadi",
        }
    }

    /// True for the statuses counted as recovering in the panel.
    pub fn is_recovering(&self) -> bool {
        matches!(
            self,
            RecoveryStatus::Toparlaniyor | RecoveryStatus::YeniToparlaniyor
        )
    }
}

/// One matched pair with its before/after metrics and classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub old_url: String,
    pub new_url: String,
    pub before_clicks: f64,
    pub after_clicks: f64,
    pub click_delta: f64,
    pub before_position: f64,
    pub after_position: f64,
    /// Positive means improvement: numerically lower positions rank higher.
    pub position_delta: f64,
    pub status: RecoveryStatus,
    pub reason: MatchReason,
}

/// A comparison row that lost traffic, with the size of the loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedRow {
    #[serde(flatten)]
    pub row: ComparisonRow,
    pub lost_clicks: f64,
}

/// One horizon of the recovery projection panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPanelEntry {
    pub day: u32,
    /// Projected percentage, capped at 100.
    pub recovery_rate: u32,
    pub recovering_count: usize,
    pub unresolved_count: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Classifies one pair. `score_threshold` is `None` in site-scan mode, where
/// every pairing is the URL itself and the manual check does not apply.
fn compare_status(
    before: &PageMetrics,
    after: &PageMetrics,
    item: &MatchResult,
    score_threshold: Option<u32>,
) -> RecoveryStatus {
    if let Some(threshold) = score_threshold {
        if item.score < threshold {
            return RecoveryStatus::ManualGerekli;
        }
    }
    if before.clicks == 0.0 && after.clicks > 0.0 {
        return RecoveryStatus::YeniToparlaniyor;
    }
    let clicks_ok = after.clicks >= before.clicks * 0.9;
    let position_ok = after.position <= before.position + 0.3;
    if clicks_ok || position_ok {
        RecoveryStatus::Toparlaniyor
    } else {
        RecoveryStatus::DuzeltildiAmaToparlanmadi
    }
}

/// Builds comparison rows and the unresolved subset.
///
/// Returns empty output unless both snapshots are non-empty: a one-sided
/// comparison would only mislead. Before-metrics are looked up by old URL
/// (falling back to the new URL), after-metrics by new URL (falling back to
/// the old). Rows are sorted by absolute click delta descending; unresolved
/// rows by lost clicks descending.
pub fn build_comparison_rows(
    matches: &[MatchResult],
    before_map: &MetricSnapshot,
    after_map: &MetricSnapshot,
    score_threshold: Option<u32>,
) -> (Vec<ComparisonRow>, Vec<UnresolvedRow>) {
    let mut rows = Vec::new();
    let mut unresolved = Vec::new();
    if before_map.is_empty() || after_map.is_empty() {
        return (rows, unresolved);
    }

    for item in matches {
        let before = pick_metric(before_map, &item.old_url, &item.new_url);
        let after = pick_metric(after_map, &item.new_url, &item.old_url);
        let status = compare_status(&before, &after, item, score_threshold);
        let row = ComparisonRow {
            old_url: item.old_url.clone(),
            new_url: item.new_url.clone(),
            before_clicks: round2(before.clicks),
            after_clicks: round2(after.clicks),
            click_delta: round2(after.clicks - before.clicks),
            before_position: round2(before.position),
            after_position: round2(after.position),
            position_delta: round2(before.position - after.position),
            status,
            reason: item.reason,
        };
        if status == RecoveryStatus::DuzeltildiAmaToparlanmadi {
            unresolved.push(UnresolvedRow {
                row: row.clone(),
                lost_clicks: round2(before.clicks - after.clicks),
            });
        }
        rows.push(row);
    }

    rows.sort_by(|a, b| {
        b.click_delta
            .abs()
            .partial_cmp(&a.click_delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    unresolved.sort_by(|a, b| {
        b.lost_clicks
            .partial_cmp(&a.lost_clicks)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    (rows, unresolved)
}

/// Projects recovery rates for the day 7/14/30 horizons.
///
/// Base rate is the recovering share of all rows; each horizon adds a fixed
/// optimism bonus and caps at 100.
pub fn build_recovery_panel(rows: &[ComparisonRow]) -> Vec<RecoveryPanelEntry> {
    if rows.is_empty() {
        return Vec::new();
    }
    let total = rows.len();
    let recovering = rows.iter().filter(|r| r.status.is_recovering()).count();
    let unresolved = rows
        .iter()
        .filter(|r| r.status == RecoveryStatus::DuzeltildiAmaToparlanmadi)
        .count();
    let base_rate = ((recovering as f64 / total.max(1) as f64) * 100.0).round() as u32;

    RECOVERY_BONUSES
        .iter()
        .map(|&(day, bonus)| RecoveryPanelEntry {
            day,
            recovery_rate: (base_rate + bonus).min(100),
            recovering_count: recovering,
            unresolved_count: unresolved,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{build_metric_map, MetricRecord};
    use crate::urls::PageType;

    fn metric(url: &str, clicks: f64, position: f64) -> MetricRecord {
        MetricRecord {
            url: url.to_string(),
            clicks,
            impressions: clicks * 10.0,
            position,
        }
    }

    fn matched(old: &str, new: &str, score: u32) -> MatchResult {
        MatchResult::new(old, new, score, MatchReason::ExactPath, PageType::Page)
    }

    #[test]
    fn test_empty_snapshot_yields_no_rows() {
        let matches = vec![matched("https://o.com/a", "https://n.com/a", 95)];
        let before = build_metric_map(&[metric("https://o.com/a", 10.0, 5.0)]);
        let (rows, unresolved) = build_comparison_rows(&matches, &before, &MetricSnapshot::new(), Some(70));
        assert!(rows.is_empty());
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_low_score_is_manual_even_when_clicks_improved() {
        let matches = vec![matched("https://o.com/a", "https://n.com/a", 40)];
        let before = build_metric_map(&[metric("https://o.com/a", 1.0, 50.0)]);
        let after = build_metric_map(&[metric("https://n.com/a", 500.0, 1.0)]);
        let (rows, _) = build_comparison_rows(&matches, &before, &after, Some(70));
        assert_eq!(rows[0].status, RecoveryStatus::ManualGerekli);
    }

    #[test]
    fn test_new_traffic_classifies_as_fresh_recovery() {
        let matches = vec![matched("https://o.com/a", "https://n.com/a", 95)];
        let before = build_metric_map(&[metric("https://o.com/other", 1.0, 5.0)]);
        let after = build_metric_map(&[metric("https://n.com/a", 3.0, 9.0)]);
        let (rows, _) = build_comparison_rows(&matches, &before, &after, Some(70));
        assert_eq!(rows[0].status, RecoveryStatus::YeniToparlaniyor);
    }

    #[test]
    fn test_retained_clicks_classify_as_recovering() {
        let matches = vec![matched("https://o.com/a", "https://n.com/a", 95)];
        let before = build_metric_map(&[metric("https://o.com/a", 100.0, 4.0)]);
        let after = build_metric_map(&[metric("https://n.com/a", 95.0, 8.0)]);
        let (rows, _) = build_comparison_rows(&matches, &before, &after, Some(70));
        assert_eq!(rows[0].status, RecoveryStatus::Toparlaniyor);
    }

    #[test]
    fn test_position_rescues_click_drop() {
        // Clicks fell below 90% but position held within +0.3.
        let matches = vec![matched("https://o.com/a", "https://n.com/a", 95)];
        let before = build_metric_map(&[metric("https://o.com/a", 100.0, 4.0)]);
        let after = build_metric_map(&[metric("https://n.com/a", 50.0, 4.2)]);
        let (rows, _) = build_comparison_rows(&matches, &before, &after, Some(70));
        assert_eq!(rows[0].status, RecoveryStatus::Toparlaniyor);
    }

    #[test]
    fn test_unrecovered_row_carries_lost_clicks() {
        // 140 < 0.9*200 and position worsened past the tolerance.
        let matches = vec![matched("https://o.com/a", "https://n.com/a", 95)];
        let before = build_metric_map(&[metric("https://o.com/a", 200.0, 4.0)]);
        let after = build_metric_map(&[metric("https://n.com/a", 140.0, 9.0)]);
        let (rows, unresolved) = build_comparison_rows(&matches, &before, &after, Some(70));
        assert_eq!(rows[0].status, RecoveryStatus::DuzeltildiAmaToparlanmadi);
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].lost_clicks, 60.0);
        assert_eq!(rows[0].click_delta, -60.0);
        assert_eq!(rows[0].position_delta, -5.0);
    }

    #[test]
    fn test_rows_sorted_by_absolute_click_delta() {
        let matches = vec![
            matched("https://o.com/small", "https://n.com/small", 95),
            matched("https://o.com/big", "https://n.com/big", 95),
        ];
        let before = build_metric_map(&[
            metric("https://o.com/small", 10.0, 3.0),
            metric("https://o.com/big", 500.0, 3.0),
        ]);
        let after = build_metric_map(&[
            metric("https://n.com/small", 9.0, 3.0),
            metric("https://n.com/big", 100.0, 30.0),
        ]);
        let (rows, _) = build_comparison_rows(&matches, &before, &after, Some(70));
        assert_eq!(rows[0].old_url, "https://o.com/big");
    }

    #[test]
    fn test_scan_mode_skips_threshold_check() {
        let matches = vec![matched("https://n.com/a", "https://n.com/a", 0)];
        let before = build_metric_map(&[metric("https://n.com/a", 10.0, 5.0)]);
        let after = build_metric_map(&[metric("https://n.com/a", 10.0, 5.0)]);
        let (rows, _) = build_comparison_rows(&matches, &before, &after, None);
        assert_eq!(rows[0].status, RecoveryStatus::Toparlaniyor);
    }

    #[test]
    fn test_recovery_panel_monotonic_and_capped() {
        let matches = vec![
            matched("https://o.com/a", "https://n.com/a", 95),
            matched("https://o.com/b", "https://n.com/b", 95),
        ];
        let before = build_metric_map(&[
            metric("https://o.com/a", 10.0, 3.0),
            metric("https://o.com/b", 100.0, 3.0),
        ]);
        let after = build_metric_map(&[
            metric("https://n.com/a", 10.0, 3.0),
            metric("https://n.com/b", 10.0, 30.0),
        ]);
        let (rows, _) = build_comparison_rows(&matches, &before, &after, Some(70));
        let panel = build_recovery_panel(&rows);
        assert_eq!(panel.len(), 3);
        // base 50%, bonuses 5/10/18
        assert_eq!(panel[0].recovery_rate, 55);
        assert_eq!(panel[1].recovery_rate, 60);
        assert_eq!(panel[2].recovery_rate, 68);
        assert!(panel[0].recovery_rate <= panel[1].recovery_rate);
        assert!(panel[1].recovery_rate <= panel[2].recovery_rate);

        // All recovering: every horizon caps at 100.
        let all_good: Vec<ComparisonRow> = rows
            .iter()
            .cloned()
            .map(|mut r| {
                r.status = RecoveryStatus::Toparlaniyor;
                r
            })
            .collect();
        for entry in build_recovery_panel(&all_good) {
            assert_eq!(entry.recovery_rate, 100);
        }
    }

    #[test]
    fn test_recovery_panel_empty_rows() {
        assert!(build_recovery_panel(&[]).is_empty());
    }
}
