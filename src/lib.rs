//! seo_recovery library: post-migration SEO recovery analysis.
//!
//! Matches a site's old URLs to their new counterparts, audits the new site
//! for indexing blockers, compares search performance before and after
//! remediation, and tracks each analysis as a cancellable background job.
//!
//! # Example
//!
//! ```no_run
//! use seo_recovery::{perform_analysis, AnalysisInput, PipelineContext};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let ctx = PipelineContext::new()?;
//! let input = AnalysisInput {
//!     old_urls: vec!["https://old.example.com/products/black-dress".into()],
//!     new_urls: vec!["https://new.example.com/products/black-dress".into()],
//!     ..Default::default()
//! };
//! let cancel = CancellationToken::new();
//! let package = perform_analysis(&ctx, input, &cancel, &|pct, stage| {
//!     println!("{pct}% {stage}");
//! })
//! .await?;
//! println!("{} of {} URLs matched automatically",
//!          package.summary.auto_matched, package.summary.total_old_urls);
//! # Ok(())
//! # }
//! ```
//!
//! All network-facing functions require a Tokio runtime.

pub mod audit;
pub mod compare;
pub mod config;
pub mod crawler;
pub mod error;
pub mod job;
pub mod logging;
pub mod matching;
pub mod metrics;
pub mod pipeline;
pub mod urls;

// Re-export the public API surface.
pub use compare::{ComparisonRow, RecoveryPanelEntry, RecoveryStatus, UnresolvedRow};
pub use config::{LogFormat, LogLevel, Opt};
pub use error::{AnalysisError, FetchErrorKind, FetchStats};
pub use job::{CancelOutcome, JobRunner, JobSnapshot, JobStatus, JobStore, ResultStore};
pub use matching::{MatchReason, MatchResult, MatchSummary, RedirectPair, UrgentAction};
pub use metrics::{MetricRecord, MetricSnapshot, PageMetrics};
pub use pipeline::{
    perform_analysis, AnalysisInput, AnalysisMode, AnalysisPackage, PipelineContext,
};
pub use urls::{PageType, UrlRecord};
