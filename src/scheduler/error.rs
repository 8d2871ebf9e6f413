//! Error types for the job scheduler.

use thiserror::Error;
use uuid::Uuid;

use super::job::JobStatus;
use crate::storage::StoreError;

/// Errors that can occur when submitting or managing analysis jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The submitted configuration failed validation. No job record exists.
    #[error("Invalid analysis request: {0}")]
    InvalidRequest(String),

    /// No job with this id exists in the store.
    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// The job already reached a terminal state.
    #[error("Job {id} is already {status}")]
    AlreadyTerminal { id: Uuid, status: JobStatus },

    /// The job store rejected or failed a read/write.
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    /// A stored result could not be decoded.
    #[error("Result serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
