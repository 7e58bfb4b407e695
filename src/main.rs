//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `seo_recovery` library that handles:
//! - Command-line argument parsing
//! - Input file reading (URL lists and metric CSVs)
//! - Logger initialization
//! - Ctrl-C wiring into the analysis cancellation token
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use seo_recovery::logging::init_logger_with;
use seo_recovery::{
    perform_analysis, AnalysisError, AnalysisInput, AnalysisMode, AnalysisPackage, MetricRecord,
    Opt, PipelineContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())?;

    let input = build_input(&opt).await?;

    let ctx = PipelineContext::new().context("Failed to build HTTP client")?;
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Ctrl-C received, stopping at the next stage boundary");
            ctrl_c_token.cancel();
        }
    });

    let result = perform_analysis(&ctx, input, &cancel, &|percent, stage| {
        log::info!("{percent}% - {stage}");
    })
    .await;

    ctx.fetch_stats.log_summary();

    match result {
        Ok(package) => {
            print_summary(&package);
            Ok(())
        }
        Err(AnalysisError::Cancelled) => {
            println!("Analysis cancelled.");
            process::exit(130);
        }
        Err(e) => {
            for line in e.to_lines() {
                eprintln!("{line}");
            }
            process::exit(1);
        }
    }
}

/// Assembles the analysis input from CLI options and input files.
async fn build_input(opt: &Opt) -> Result<AnalysisInput> {
    Ok(AnalysisInput {
        old_urls: read_url_lines(opt.old_urls.as_deref()).await?,
        new_urls: read_url_lines(opt.new_urls.as_deref()).await?,
        gsc_before: read_metric_csv(opt.gsc_before.as_deref()).await?,
        gsc_after: read_metric_csv(opt.gsc_after.as_deref()).await?,
        site_url: opt.site_url.clone(),
        crawl: opt.crawl,
        crawl_limit: opt.crawl_limit,
        audit: opt.audit,
        audit_limit: opt.audit_limit,
    })
}

/// Reads a one-URL-per-line file. Blank lines and `#` comments are skipped;
/// a missing option yields an empty list.
async fn read_url_lines(path: Option<&Path>) -> Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read URL file {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Reads a `url,clicks,impressions,position` CSV. A header row is detected
/// by its non-numeric clicks column and skipped; malformed rows are dropped
/// with a warning.
async fn read_metric_csv(path: Option<&Path>) -> Result<Vec<MetricRecord>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read metrics file {}", path.display()))?;
    Ok(parse_metric_lines(&text))
}

fn parse_metric_lines(text: &str) -> Vec<MetricRecord> {
    let mut records = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            log::warn!("Skipping metrics row {} with {} field(s)", index + 1, fields.len());
            continue;
        }
        let parsed = (
            fields[1].parse::<f64>(),
            fields[2].parse::<f64>(),
            fields[3].parse::<f64>(),
        );
        match parsed {
            (Ok(clicks), Ok(impressions), Ok(position)) => records.push(MetricRecord {
                url: fields[0].to_string(),
                clicks,
                impressions,
                position,
            }),
            _ if index == 0 => {} // header row
            _ => log::warn!("Skipping unparseable metrics row {}", index + 1),
        }
    }
    records
}

fn print_summary(package: &AnalysisPackage) {
    match package.mode {
        AnalysisMode::Migration => {
            println!(
                "✅ Matched {} of {} old URLs automatically ({} need manual review)",
                package.summary.auto_matched,
                package.summary.total_old_urls,
                package.summary.manual_required
            );
            if !package.redirects.is_empty() {
                println!("Redirect suggestions: {}", package.redirects.len());
                for pair in package.redirects.iter().take(10) {
                    println!("  {} -> {}", pair.from, pair.to);
                }
            }
        }
        AnalysisMode::Scan => {
            println!(
                "✅ Scanned {} URLs from the live site",
                package.matches.len()
            );
        }
    }

    if !package.audit_results.is_empty() {
        println!(
            "Audit: {} result(s), {} critical",
            package.audit_results.len(),
            package.critical_issues
        );
        for item in package
            .audit_results
            .iter()
            .filter(|r| r.severity == seo_recovery::audit::Severity::Critical)
            .take(10)
        {
            println!("  [{}] {} - {}", item.status_code, item.url, item.cause);
        }
    }

    if !package.comparison.is_empty() {
        println!(
            "Performance: {} compared, {} not recovering",
            package.comparison.len(),
            package.unresolved.len()
        );
        for entry in &package.recovery_panel {
            println!(
                "  day {}: projected recovery {}%",
                entry.day, entry.recovery_rate
            );
        }
    }

    if !package.urgent_actions.is_empty() {
        println!("Top urgent actions:");
        for action in package.urgent_actions.iter().take(5) {
            println!(
                "  {:>8.2}  {} ({})",
                action.impact, action.old_url, action.reason
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metric_lines_skips_header_and_garbage() {
        let text = "url,clicks,impressions,position\n\
                    https://x.com/a,10,100,3.5\n\
                    \n\
                    broken row\n\
                    https://x.com/b,not-a-number,1,1\n\
                    https://x.com/c,0,0,999\n";
        let records = parse_metric_lines(text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, "https://x.com/a");
        assert_eq!(records[0].clicks, 10.0);
        assert_eq!(records[1].position, 999.0);
    }

    #[test]
    fn test_parse_metric_lines_headerless_file() {
        let records = parse_metric_lines("https://x.com/a,1,2,3\n");
        assert_eq!(records.len(), 1);
    }
}
