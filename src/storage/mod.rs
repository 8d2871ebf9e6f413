//! Durable storage for analysis jobs and their results.
//!
//! The job store is the single source of truth for job status. Two
//! implementations are provided:
//!
//! - **SqliteJobStore**: `sqlx` SQLite pool, used by the CLI and long-running processes
//! - **InMemoryJobStore**: process-local maps for tests and ephemeral runs
//!
//! Both honor the same write contract: [`JobStore::upsert_job`] never
//! overwrites a record whose stored status is terminal, so a late completion
//! write cannot resurrect a cancelled job. Only submission inserts; every
//! later transition goes through [`JobStore::update_job`], which never
//! recreates a deleted record.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gapforge::storage::{JobStore, SqliteJobStore};
//!
//! let store = SqliteJobStore::open("gapforge.db").await?;
//! store.upsert_job(&job).await?;
//! let recent = store.list_jobs(20).await?;
//! ```

pub mod memory;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::scheduler::Job;

pub use memory::InMemoryJobStore;
pub use schema::{JobData, JOB_SCHEMA_VERSION};
pub use sqlite::SqliteJobStore;

/// Errors that can occur in the job store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Opening the database failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization of a JSON blob failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be mapped back to a record.
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

/// The synthesis report of a completed job, kept as the exact JSON text
/// that was written so repeated reads are byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub report_json: String,
}

impl StoredResult {
    pub fn new(job_id: Uuid, report_json: String) -> Self {
        Self {
            job_id,
            created_at: Utc::now(),
            report_json,
        }
    }
}

/// Durable record of jobs and results, keyed by job id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts or updates a job record.
    ///
    /// Returns `false` without writing when the stored record is already
    /// terminal. Writing the same non-terminal record twice is harmless.
    async fn upsert_job(&self, job: &Job) -> Result<bool, StoreError>;

    /// Updates an existing non-terminal job record.
    ///
    /// Never creates a record: returns `false` when the job is missing
    /// (e.g. deleted) or already terminal.
    async fn update_job(&self, job: &Job) -> Result<bool, StoreError>;

    /// Fetches a job by id.
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Most recently created jobs first, at most `limit`.
    async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// All jobs whose stored status is `pending` or `running`.
    async fn list_active_jobs(&self) -> Result<Vec<Job>, StoreError>;

    /// Removes a job and its result. Returns whether the job existed.
    async fn delete_job(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Inserts or replaces the result for a job.
    async fn upsert_result(&self, result: &StoredResult) -> Result<(), StoreError>;

    /// Fetches the result for a job.
    async fn get_result(&self, job_id: Uuid) -> Result<Option<StoredResult>, StoreError>;
}
