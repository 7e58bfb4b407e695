use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Per-request timeout for audit and crawl fetches.
///
/// Migrated sites are often on fresh (cold) hosting; 8 seconds gives slow
/// origins a fair chance while keeping a stuck batch bounded.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Default number of concurrent audit fetches per batch.
pub const AUDIT_WORKERS: usize = 8;

/// Number of URLs audited per batch. Progress is reported and the
/// cancellation token is checked between batches, never mid-batch.
pub const AUDIT_BATCH_SIZE: usize = 40;

/// Inclusive bounds for the audit URL cap supplied by callers.
pub const AUDIT_LIMIT_MIN: usize = 1;
pub const AUDIT_LIMIT_MAX: usize = 500;

/// Inclusive bounds for the crawl discovery cap supplied by callers.
pub const CRAWL_LIMIT_MIN: usize = 10;
pub const CRAWL_LIMIT_MAX: usize = 2000;

/// Crawl frontier is truncated at `cap * CRAWL_FRONTIER_FACTOR` to bound
/// queue growth on heavily interlinked sites.
pub const CRAWL_FRONTIER_FACTOR: usize = 5;

/// Matches scoring below this are routed to manual review.
pub const MATCH_SCORE_THRESHOLD: u32 = 70;

/// Weight of the character-level LCS ratio in the combined slug score.
///
/// Heuristic tuning value carried over from the production system; kept as a
/// named constant rather than a hard invariant.
pub const SLUG_SEQUENCE_WEIGHT: f64 = 0.75;

/// Weight of the token Jaccard similarity in the combined slug score.
pub const SLUG_JACCARD_WEIGHT: f64 = 0.25;

/// Minimum combined similarity percentage for a slug match to be accepted.
pub const SLUG_ACCEPT_FLOOR: u32 = 60;

/// Position value meaning "not ranked" in metric snapshots.
pub const UNRANKED_POSITION: f64 = 999.0;

/// Optimistic recovery-rate bonuses for the day 7/14/30 projection panel.
/// A coarse decay model, not a statistical forecast.
pub const RECOVERY_BONUSES: &[(u32, u32)] = &[(7, 5), (14, 10), (30, 18)];

/// User-Agent sent on every audit and crawl request.
pub const USER_AGENT: &str = "SEO-Recovery-Audit/1.0";

/// Maximum URL length accepted from input lists. Matches common browser and
/// server limits.
pub const MAX_URL_LENGTH: usize = 2048;

/// File extensions excluded from crawl discovery (assets, not pages).
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".json", ".map",
    ".woff", ".woff2", ".ttf", ".eot", ".pdf", ".zip",
];

/// Path substrings excluded from crawl discovery (build/asset directories).
pub const EXCLUDED_PATH_PARTS: &[&str] = &["/build/", "/assets/"];

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to
/// most verbose (Trace). Used with the `--log-level` CLI option.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

/// Command-line options and configuration.
///
/// This struct is automatically generated by `clap` from the field
/// attributes. All options have sensible defaults and can be overridden via
/// command-line flags.
///
/// # Examples
///
/// ```bash
/// # Match an old URL list against a new one
/// seo_recovery --old-urls old.txt --new-urls new.txt
///
/// # Discover the new site automatically and audit it
/// seo_recovery --site-url https://new.example.com --crawl --audit
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "seo_recovery",
    about = "Matches old URLs to new ones after a migration, audits the new site, and reports recovery."
)]
pub struct Opt {
    /// File with old (pre-migration) URLs, one per line
    #[arg(long, value_parser)]
    pub old_urls: Option<PathBuf>,

    /// File with new (post-migration) URLs, one per line
    #[arg(long, value_parser)]
    pub new_urls: Option<PathBuf>,

    /// Search-performance CSV for the period before remediation
    /// (url,clicks,impressions,position per line)
    #[arg(long, value_parser)]
    pub gsc_before: Option<PathBuf>,

    /// Search-performance CSV for the period after remediation
    #[arg(long, value_parser)]
    pub gsc_after: Option<PathBuf>,

    /// Root URL of the new site (used for robots/sitemap checks and crawling)
    #[arg(long, default_value = "")]
    pub site_url: String,

    /// Discover new URLs by crawling the site instead of reading --new-urls
    #[arg(long, default_value_t = false)]
    pub crawl: bool,

    /// Maximum number of URLs to discover while crawling
    #[arg(long, default_value_t = 200)]
    pub crawl_limit: usize,

    /// Run the technical audit on the new URL set
    #[arg(long, default_value_t = false)]
    pub audit: bool,

    /// Maximum number of URLs to audit
    #[arg(long, default_value_t = 150)]
    pub audit_limit: usize,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,
}
