//! Background job tracking for analysis runs.
//!
//! Each run gets an id, a cancellation token, and a status record that moves
//! from running to exactly one terminal state. Progress updates after a
//! terminal transition are dropped, so late stage callbacks from an already
//! cancelled run can never resurrect it.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::pipeline::{perform_analysis, AnalysisInput, AnalysisPackage, PipelineContext};

/// Lifecycle state of a job. `Running` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        *self != JobStatus::Running
    }
}

/// Point-in-time copy of a job's public state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    /// 1-99 while running, 100 in any terminal state.
    pub progress: u8,
    pub stage: String,
    /// Rough seconds remaining; never 0 while running.
    pub eta_seconds: u64,
    /// Short status line, e.g. "Analysis cancelled."; empty while running.
    pub message: String,
    /// Error detail for failed jobs; empty otherwise.
    pub error: String,
    /// Correlation id for failed jobs, when the failure carries one.
    pub log_id: Option<String>,
    /// True once a cancel request has been accepted for this job.
    pub cancel_requested: bool,
    /// True while the job can still be cancelled.
    pub can_cancel: bool,
}

struct JobEntry {
    status: JobStatus,
    progress: u8,
    stage: String,
    eta_seconds: u64,
    message: String,
    error: String,
    log_id: Option<String>,
    cancel_requested: bool,
    started: Instant,
    cancel: CancellationToken,
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    NotFound,
    /// The job already reached a terminal state; nothing to cancel.
    Finished,
    /// The token fired; the job will stop at its next stage boundary.
    Cancelling,
}

/// Terminal outcome reported by the runner.
pub enum JobOutcome {
    Done,
    Error {
        message: String,
        log_id: Option<String>,
    },
    Cancelled,
}

/// Registry of running and finished jobs.
///
/// Entries are kept after completion so their final status stays queryable;
/// there is no eviction. Lock scope is a few field writes, so a plain mutex
/// is fine even under async callers.
pub struct JobStore {
    jobs: Mutex<HashMap<String, JobEntry>>,
}

impl JobStore {
    pub fn new() -> Self {
        JobStore {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new running job. Returns its id and cancellation token.
    pub fn create(&self) -> (String, CancellationToken) {
        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let entry = JobEntry {
            status: JobStatus::Running,
            progress: 1,
            stage: "Starting".to_string(),
            eta_seconds: 0,
            message: String::new(),
            error: String::new(),
            log_id: None,
            cancel_requested: false,
            started: Instant::now(),
            cancel: cancel.clone(),
        };
        self.jobs
            .lock()
            .expect("job store mutex poisoned - this is a bug")
            .insert(id.clone(), entry);
        (id, cancel)
    }

    /// Updates progress for a running job. Percent is clamped to 1-99 so a
    /// stage callback can never show a finished bar; the ETA is recomputed
    /// from elapsed time. No-op for unknown or terminal jobs.
    pub fn update_progress(&self, id: &str, percent: u8, stage: &str) {
        let mut jobs = self
            .jobs
            .lock()
            .expect("job store mutex poisoned - this is a bug");
        let Some(entry) = jobs.get_mut(id) else {
            return;
        };
        if entry.status.is_terminal() {
            return;
        }
        let percent = percent.clamp(1, 99);
        entry.progress = percent;
        entry.stage = stage.to_string();
        entry.eta_seconds = estimate_eta(entry.started.elapsed().as_secs_f64(), percent);
    }

    /// Moves a job to a terminal state. Absorbing: the first terminal
    /// transition wins and later calls are ignored. Every terminal state
    /// pins progress at 100 and the ETA at 0; polling clients stop on
    /// progress, not status.
    pub fn finish(&self, id: &str, outcome: JobOutcome) {
        let mut jobs = self
            .jobs
            .lock()
            .expect("job store mutex poisoned - this is a bug");
        let Some(entry) = jobs.get_mut(id) else {
            return;
        };
        if entry.status.is_terminal() {
            return;
        }
        entry.progress = 100;
        entry.eta_seconds = 0;
        match outcome {
            JobOutcome::Done => {
                entry.status = JobStatus::Done;
                entry.stage = "Done".to_string();
            }
            JobOutcome::Error { message, log_id } => {
                entry.status = JobStatus::Error;
                entry.message = "Analysis failed.".to_string();
                entry.error = message;
                entry.log_id = log_id;
            }
            JobOutcome::Cancelled => {
                entry.status = JobStatus::Cancelled;
                entry.message = "Analysis cancelled.".to_string();
            }
        }
    }

    /// Fires a job's cancellation token.
    pub fn request_cancel(&self, id: &str) -> CancelOutcome {
        let mut jobs = self
            .jobs
            .lock()
            .expect("job store mutex poisoned - this is a bug");
        match jobs.get_mut(id) {
            None => CancelOutcome::NotFound,
            Some(entry) if entry.status.is_terminal() => CancelOutcome::Finished,
            Some(entry) => {
                entry.cancel_requested = true;
                entry.cancel.cancel();
                CancelOutcome::Cancelling
            }
        }
    }

    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        let jobs = self
            .jobs
            .lock()
            .expect("job store mutex poisoned - this is a bug");
        jobs.get(id).map(|entry| JobSnapshot {
            id: id.to_string(),
            status: entry.status,
            progress: entry.progress,
            stage: entry.stage.clone(),
            eta_seconds: entry.eta_seconds,
            message: entry.message.clone(),
            error: entry.error.clone(),
            log_id: entry.log_id.clone(),
            cancel_requested: entry.cancel_requested,
            can_cancel: !entry.status.is_terminal(),
        })
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds remaining, extrapolated linearly from elapsed time. Never 0 for a
/// job still in flight.
fn estimate_eta(elapsed_secs: f64, percent: u8) -> u64 {
    let percent = percent.max(1) as f64;
    let remaining = elapsed_secs / percent * (100.0 - percent);
    (remaining.round() as u64).max(1)
}

/// Completed analysis results, keyed by job id.
///
/// Write-once: a second insert for the same id is rejected, which keeps a
/// result immutable once a reader may have seen it.
pub struct ResultStore {
    results: Mutex<HashMap<String, Arc<AnalysisPackage>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        ResultStore {
            results: Mutex::new(HashMap::new()),
        }
    }

    /// Stores a result. Returns false (and keeps the original) when the id
    /// already has one.
    pub fn put(&self, id: &str, package: AnalysisPackage) -> bool {
        let mut results = self
            .results
            .lock()
            .expect("result store mutex poisoned - this is a bug");
        if results.contains_key(id) {
            return false;
        }
        results.insert(id.to_string(), Arc::new(package));
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<AnalysisPackage>> {
        self.results
            .lock()
            .expect("result store mutex poisoned - this is a bug")
            .get(id)
            .cloned()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns analysis runs as background tasks and records their outcomes.
pub struct JobRunner {
    pub jobs: Arc<JobStore>,
    pub results: Arc<ResultStore>,
    pub ctx: Arc<PipelineContext>,
}

impl JobRunner {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        JobRunner {
            jobs: Arc::new(JobStore::new()),
            results: Arc::new(ResultStore::new()),
            ctx,
        }
    }

    /// Starts one analysis in a background task and returns its job id
    /// immediately.
    pub fn spawn(&self, input: AnalysisInput) -> String {
        let (id, cancel) = self.jobs.create();
        let jobs = Arc::clone(&self.jobs);
        let results = Arc::clone(&self.results);
        let ctx = Arc::clone(&self.ctx);
        let job_id = id.clone();
        tokio::spawn(async move {
            execute(&jobs, &results, &ctx, input, &job_id, &cancel).await;
        });
        id
    }
}

/// Runs one analysis to completion and records its terminal state.
///
/// A panic anywhere in the pipeline is caught here and recorded as an
/// internal error, so a crashed job can never sit in `Running` forever.
pub async fn execute(
    jobs: &JobStore,
    results: &ResultStore,
    ctx: &PipelineContext,
    input: AnalysisInput,
    job_id: &str,
    cancel: &CancellationToken,
) {
    let progress = {
        let job_id = job_id.to_string();
        move |percent: u8, stage: &str| {
            jobs.update_progress(&job_id, percent, stage);
        }
    };

    match guard_panics(perform_analysis(ctx, input, cancel, &progress)).await {
        Ok(package) => {
            results.put(job_id, package);
            jobs.finish(job_id, JobOutcome::Done);
            log::info!("Job {job_id} finished");
        }
        Err(AnalysisError::Cancelled) => {
            jobs.finish(job_id, JobOutcome::Cancelled);
            log::info!("Job {job_id} cancelled");
        }
        Err(error) => {
            if let AnalysisError::Internal { log_id, source } = &error {
                log::error!("Job {job_id} failed internally ({log_id}): {source:?}");
            } else {
                log::warn!("Job {job_id} failed: {error}");
            }
            let log_id = error.log_id().map(str::to_string);
            jobs.finish(
                job_id,
                JobOutcome::Error {
                    message: error.to_status_line(),
                    log_id,
                },
            );
        }
    }
}

/// Converts a panic in the analysis future into an internal error. The
/// panic detail goes to the error source (logs only), never to users.
async fn guard_panics<F>(future: F) -> Result<AnalysisPackage, AnalysisError>
where
    F: std::future::Future<Output = Result<AnalysisPackage, AnalysisError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(AnalysisError::internal(anyhow::anyhow!(
            "analysis task panicked: {}",
            panic_detail(payload)
        ))),
    }
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
