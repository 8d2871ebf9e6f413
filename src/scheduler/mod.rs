//! Durable job scheduling for gap analyses.
//!
//! - **Job**: request, lifecycle status and progress narration of one analysis
//! - **AdmissionGate**: bounded number of concurrently running jobs
//! - **JobScheduler**: submission, status and result lookups, cancellation,
//!   deletion and reconciliation of jobs orphaned by a restart
//!
//! # Lifecycle
//!
//! ```text
//!   submit ──► Pending ──(slot free)──► Running ──► Completed
//!                 │                        │
//!                 └──────(cancel)──────────┴──────► Failed
//! ```
//!
//! Terminal states are final. The store refuses to overwrite a terminal
//! record, so a job cancelled while running stays failed even when its
//! orchestrator finishes afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use gapforge::scheduler::{AnalysisRequest, JobScheduler, SchedulerConfig};
//!
//! let scheduler = JobScheduler::new(SchedulerConfig::default(), store, orchestrator);
//! let receipt = scheduler.submit(AnalysisRequest::new("https://arxiv.org/abs/2401.00001")).await?;
//! let status = scheduler.get_status(receipt.job_id).await?;
//! ```

pub mod admission;
pub mod error;
pub mod job;
pub mod runner;

pub use admission::{AdmissionGate, AdmissionSlot};
pub use error::SchedulerError;
pub use job::{
    AnalysisMode, AnalysisRequest, Job, JobStatus, JobStatusView, SubmissionReceipt,
    CANCELLED_ERROR, DEFAULT_MAX_PAPERS, DEFAULT_VALIDATION_THRESHOLD, MAX_MAX_PAPERS,
    MAX_VALIDATION_THRESHOLD, MIN_MAX_PAPERS, MIN_VALIDATION_THRESHOLD,
};
pub use runner::{
    JobScheduler, ResultLookup, SchedulerConfig, SchedulerStats, DEFAULT_ADMISSION_POLL,
    DEFAULT_MAX_CONCURRENT_JOBS, INTERRUPTED_ERROR,
};
