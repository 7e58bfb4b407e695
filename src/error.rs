//! Error taxonomy and fetch-failure statistics.
//!
//! Pipeline-level failures fall into three categories: validation failures
//! (all messages collected and surfaced together), cancellation (a signal,
//! not an error), and unexpected internal failures (wrapped with an opaque
//! correlation id so users can report it without seeing internals).
//!
//! Per-URL fetch failures are never errors at this level; they are recorded
//! in [`FetchStats`] and downgraded to critical audit entries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;
use uuid::Uuid;

/// Generates an 8-character opaque correlation id for support triage.
fn new_log_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Failure modes of a full analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// One or more input problems. All messages are collected before the
    /// failure is surfaced so the caller sees the complete list at once.
    #[error("analysis could not start ({} problem(s), log id {log_id})", messages.len())]
    Validation {
        /// Opaque correlation id.
        log_id: String,
        /// User-facing, field-level problem descriptions.
        messages: Vec<String>,
    },

    /// The job's cancellation token fired. Not an error: the pipeline aborts
    /// cleanly at the next stage boundary.
    #[error("analysis cancelled")]
    Cancelled,

    /// Anything unexpected. Only the correlation id is shown to users.
    #[error("unexpected analysis failure (log id {log_id})")]
    Internal {
        /// Opaque correlation id.
        log_id: String,
        /// Underlying cause, for logs only.
        #[source]
        source: anyhow::Error,
    },
}

impl AnalysisError {
    /// Builds a validation failure from collected messages.
    pub fn validation(messages: Vec<String>) -> Self {
        AnalysisError::Validation {
            log_id: new_log_id(),
            messages,
        }
    }

    /// Wraps an unexpected failure with a fresh correlation id.
    pub fn internal(source: anyhow::Error) -> Self {
        AnalysisError::Internal {
            log_id: new_log_id(),
            source,
        }
    }

    /// Correlation id, when this error carries one.
    pub fn log_id(&self) -> Option<&str> {
        match self {
            AnalysisError::Validation { log_id, .. } => Some(log_id),
            AnalysisError::Internal { log_id, .. } => Some(log_id),
            AnalysisError::Cancelled => None,
        }
    }

    /// User-facing lines for display: headline, detail messages (validation
    /// only), and the correlation id.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            AnalysisError::Validation { log_id, messages } => {
                let mut lines = vec!["Analysis could not start.".to_string()];
                lines.extend(messages.iter().cloned());
                lines.push(format!("Error code: {log_id}"));
                lines
            }
            AnalysisError::Cancelled => vec!["Analysis cancelled.".to_string()],
            AnalysisError::Internal { log_id, .. } => vec![
                "An unexpected error occurred.".to_string(),
                format!("Error code: {log_id}"),
            ],
        }
    }

    /// Single-line form for job status payloads.
    pub fn to_status_line(&self) -> String {
        match self {
            AnalysisError::Validation { log_id, messages } => {
                format!("{} (Error code: {log_id})", messages.join(" "))
            }
            AnalysisError::Cancelled => "Analysis cancelled.".to_string(),
            AnalysisError::Internal { log_id, .. } => {
                format!("An unexpected error occurred. (Error code: {log_id})")
            }
        }
    }
}

/// Categories of outbound fetch failures, tracked for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum FetchErrorKind {
    Timeout,
    Connect,
    Redirect,
    Body,
    Decode,
    Request,
    TooManyRequests,
    Other,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "fetch timeout",
            FetchErrorKind::Connect => "connect error",
            FetchErrorKind::Redirect => "redirect error",
            FetchErrorKind::Body => "body error",
            FetchErrorKind::Decode => "decode error",
            FetchErrorKind::Request => "request error",
            FetchErrorKind::TooManyRequests => "too many requests",
            FetchErrorKind::Other => "other fetch error",
        }
    }

    /// Classifies a `reqwest::Error` into a tracked category.
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            if status.as_u16() == 429 {
                return FetchErrorKind::TooManyRequests;
            }
            return FetchErrorKind::Other;
        }
        if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if error.is_connect() {
            FetchErrorKind::Connect
        } else if error.is_redirect() {
            FetchErrorKind::Redirect
        } else if error.is_body() {
            FetchErrorKind::Body
        } else if error.is_decode() {
            FetchErrorKind::Decode
        } else if error.is_request() {
            FetchErrorKind::Request
        } else {
            FetchErrorKind::Other
        }
    }
}

/// Thread-safe fetch-failure counters.
///
/// Tracks the count of each failure category using atomic counters, allowing
/// concurrent access from audit and crawl tasks. Share across tasks with
/// `Arc`.
pub struct FetchStats {
    errors: HashMap<FetchErrorKind, AtomicUsize>,
}

impl FetchStats {
    pub fn new() -> Self {
        let mut errors = HashMap::new();
        for kind in FetchErrorKind::iter() {
            errors.insert(kind, AtomicUsize::new(0));
        }
        FetchStats { errors }
    }

    /// Records one failure of the given kind.
    pub fn increment(&self, kind: FetchErrorKind) {
        // All kinds are initialized in new(), so the lookup cannot miss.
        self.errors
            .get(&kind)
            .unwrap()
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Records a `reqwest::Error` under its classified kind.
    pub fn record(&self, error: &reqwest::Error) {
        self.increment(FetchErrorKind::from_reqwest(error));
    }

    pub fn get_count(&self, kind: FetchErrorKind) -> usize {
        self.errors.get(&kind).unwrap().load(Ordering::SeqCst)
    }

    /// Logs non-zero counters at info level. No output when everything
    /// succeeded.
    pub fn log_summary(&self) {
        for kind in FetchErrorKind::iter() {
            let count = self.get_count(kind);
            if count > 0 {
                log::info!("{}: {}", kind.as_str(), count);
            }
        }
    }
}

impl Default for FetchStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_stats_initialization() {
        let stats = FetchStats::new();
        for kind in FetchErrorKind::iter() {
            assert_eq!(stats.get_count(kind), 0);
        }
    }

    #[test]
    fn test_fetch_stats_increment() {
        let stats = FetchStats::new();
        stats.increment(FetchErrorKind::Timeout);
        stats.increment(FetchErrorKind::Timeout);
        assert_eq!(stats.get_count(FetchErrorKind::Timeout), 2);
        assert_eq!(stats.get_count(FetchErrorKind::Connect), 0);
    }

    #[test]
    fn test_validation_error_collects_all_messages() {
        let err = AnalysisError::validation(vec![
            "Old URL list is empty or invalid.".to_string(),
            "New URL list is empty or invalid.".to_string(),
        ]);
        let lines = err.to_lines();
        // headline + two messages + error code
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("Error code: "));
    }

    #[test]
    fn test_log_id_is_opaque_and_short() {
        let err = AnalysisError::internal(anyhow::anyhow!("secret detail"));
        let id = err.log_id().unwrap();
        assert_eq!(id.len(), 8);
        // No internal detail leaks into the user-visible lines.
        for line in err.to_lines() {
            assert!(!line.contains("secret detail"));
        }
    }

    #[test]
    fn test_cancelled_is_not_an_error_message() {
        let err = AnalysisError::Cancelled;
        assert_eq!(err.to_lines(), vec!["Analysis cancelled.".to_string()]);
        assert!(err.log_id().is_none());
    }
}
