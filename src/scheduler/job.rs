//! Job definitions for the scheduler.
//!
//! This module defines the core job types used in the scheduling system:
//!
//! - `AnalysisRequest`: validated configuration of a gap analysis
//! - `Job`: the lifecycle record persisted in the job store
//! - `JobStatus`: `pending → running → {completed, failed}`
//! - `JobStatusView` / `SubmissionReceipt`: read-only projections for callers

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::SchedulerError;

/// Smallest accepted paper budget.
pub const MIN_MAX_PAPERS: u32 = 5;
/// Largest accepted paper budget.
pub const MAX_MAX_PAPERS: u32 = 20;
/// Paper budget used when the caller does not specify one.
pub const DEFAULT_MAX_PAPERS: u32 = 10;

/// Smallest accepted validation-strike threshold.
pub const MIN_VALIDATION_THRESHOLD: u32 = 1;
/// Largest accepted validation-strike threshold.
pub const MAX_VALIDATION_THRESHOLD: u32 = 5;
/// Strike threshold used when the caller does not specify one.
pub const DEFAULT_VALIDATION_THRESHOLD: u32 = 2;

/// Error message recorded when a job is cancelled.
pub const CANCELLED_ERROR: &str = "cancelled by user";

const LIGHT_ESTIMATE_MINUTES: u32 = 2;

fn default_max_papers() -> u32 {
    DEFAULT_MAX_PAPERS
}

fn default_validation_threshold() -> u32 {
    DEFAULT_VALIDATION_THRESHOLD
}

/// How much effort a job spends exploring the frontier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Quick pass, capped at roughly two minutes of exploration.
    Light,
    /// Full exploration bounded only by the paper budget.
    #[default]
    Deep,
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisMode::Light => write!(f, "light"),
            AnalysisMode::Deep => write!(f, "deep"),
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(AnalysisMode::Light),
            "deep" => Ok(AnalysisMode::Deep),
            other => Err(SchedulerError::InvalidRequest(format!(
                "analysis mode must be 'light' or 'deep', got '{}'",
                other
            ))),
        }
    }
}

/// Configuration of a single gap analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Seed paper: a URL, a corpus reference, or raw paper text.
    #[serde(alias = "url")]
    pub seed_reference: String,
    /// Upper bound on analyzed papers and on gaps popped from the queue.
    #[serde(default = "default_max_papers")]
    pub max_papers: u32,
    /// Inconclusive validation attempts a gap must survive to be promoted.
    #[serde(default = "default_validation_threshold")]
    pub validation_threshold: u32,
    /// Records written before modes existed are read back as deep analyses.
    #[serde(default)]
    pub analysis_mode: AnalysisMode,
}

impl AnalysisRequest {
    /// Creates a request with default budgets in deep mode.
    pub fn new(seed_reference: impl Into<String>) -> Self {
        Self {
            seed_reference: seed_reference.into(),
            max_papers: DEFAULT_MAX_PAPERS,
            validation_threshold: DEFAULT_VALIDATION_THRESHOLD,
            analysis_mode: AnalysisMode::Deep,
        }
    }

    /// Sets the paper budget.
    pub fn with_max_papers(mut self, max_papers: u32) -> Self {
        self.max_papers = max_papers;
        self
    }

    /// Sets the validation-strike threshold.
    pub fn with_validation_threshold(mut self, threshold: u32) -> Self {
        self.validation_threshold = threshold;
        self
    }

    /// Sets the analysis mode.
    pub fn with_analysis_mode(mut self, mode: AnalysisMode) -> Self {
        self.analysis_mode = mode;
        self
    }

    /// Validates the request bounds.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidRequest` describing the first violated bound.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.seed_reference.trim().is_empty() {
            return Err(SchedulerError::InvalidRequest(
                "seed reference cannot be empty".to_string(),
            ));
        }

        if !(MIN_MAX_PAPERS..=MAX_MAX_PAPERS).contains(&self.max_papers) {
            return Err(SchedulerError::InvalidRequest(format!(
                "max_papers must be between {} and {}, got {}",
                MIN_MAX_PAPERS, MAX_MAX_PAPERS, self.max_papers
            )));
        }

        if !(MIN_VALIDATION_THRESHOLD..=MAX_VALIDATION_THRESHOLD)
            .contains(&self.validation_threshold)
        {
            return Err(SchedulerError::InvalidRequest(format!(
                "validation_threshold must be between {} and {}, got {}",
                MIN_VALIDATION_THRESHOLD, MAX_VALIDATION_THRESHOLD, self.validation_threshold
            )));
        }

        Ok(())
    }

    /// Rough runtime estimate shown to the submitter.
    pub fn estimated_time_minutes(&self) -> u32 {
        match self.analysis_mode {
            AnalysisMode::Light => LIGHT_ESTIMATE_MINUTES,
            AnalysisMode::Deep => {
                let scaled = 3.0 + 0.8 * f64::from(self.max_papers);
                scaled.max(5.0) as u32
            }
        }
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted and waiting for an admission slot.
    Pending,
    /// Holding an admission slot; the orchestrator is running.
    Running,
    /// Finished successfully; a result record exists.
    Completed,
    /// Finished with an error, or cancelled.
    Failed,
}

impl JobStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Returns the lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parses a stored status name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A gap analysis job.
///
/// The job store holds the canonical copy; the scheduler mutates a local
/// copy and writes every transition back before proceeding.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: Uuid,
    /// The analysis configuration.
    pub request: AnalysisRequest,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the job acquired an admission slot.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Human-readable progress narration.
    pub progress_message: String,
    /// Error text for failed jobs.
    pub error: Option<String>,
    /// Key of the stored result for completed jobs.
    pub result_ref: Option<String>,
}

impl Job {
    /// Creates a pending job for a validated request.
    pub fn new(request: AnalysisRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress_message: "Job queued for processing".to_string(),
            error: None,
            result_ref: None,
        }
    }

    /// Transitions `Pending → Running`.
    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
        self.progress_message = "Analyzing seed paper and extracting initial gaps...".to_string();
    }

    /// Replaces the progress message.
    pub fn set_progress(&mut self, message: impl Into<String>) {
        self.progress_message = message.into();
    }

    /// Transitions to `Completed` and points at the stored result.
    pub fn mark_completed(&mut self, validated_gaps: usize) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.result_ref = Some(self.id.to_string());
        self.progress_message = format!(
            "Analysis completed! Found {} validated research gaps.",
            validated_gaps
        );
    }

    /// Transitions to `Failed` with the given error text.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.progress_message = format!("Analysis failed: {}", error);
        self.error = Some(error);
    }

    /// Force-transitions a non-terminal job to `Failed` on user request.
    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.progress_message = "Job cancelled".to_string();
        self.error = Some(CANCELLED_ERROR.to_string());
    }

    /// Seconds between start and completion, once both are known.
    pub fn processing_time_seconds(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                Some((completed - started).num_milliseconds() as f64 / 1000.0)
            }
            _ => None,
        }
    }

    /// Read-only projection returned by status queries.
    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            status: self.status,
            created_at: self.created_at,
            progress_message: self.progress_message.clone(),
            url: self.request.seed_reference.clone(),
            analysis_mode: self.request.analysis_mode,
            started_at: self.started_at,
            completed_at: self.completed_at,
            processing_time_seconds: self.processing_time_seconds(),
            error: self.error.clone(),
        }
    }
}

/// Read-only projection of a job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub progress_message: String,
    pub url: String,
    pub analysis_mode: AnalysisMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response to an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub job_id: Uuid,
    /// Always `"submitted"`.
    pub status: String,
    pub message: String,
    pub estimated_time_minutes: u32,
}

impl SubmissionReceipt {
    pub(crate) fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: "submitted".to_string(),
            message: format!(
                "Gap analysis started in {} mode. Use the job id to check status.",
                job.request.analysis_mode
            ),
            estimated_time_minutes: job.request.estimated_time_minutes(),
        }
    }
}
