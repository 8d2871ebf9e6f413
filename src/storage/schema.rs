//! Database schema and the versioned job payload.
//!
//! Status, mode and timestamps live in columns so they can be filtered and
//! sorted; everything else about a job is kept in the `job_data` JSON blob
//! described by [`JobData`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::scheduler::{AnalysisRequest, Job, JobStatus};

use super::StoreError;

/// Current version of the `job_data` blob.
pub const JOB_SCHEMA_VERSION: u32 = 1;

/// SQL schema for the jobs and results tables.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id              TEXT    PRIMARY KEY,
    status          TEXT    NOT NULL DEFAULT 'pending',
    analysis_mode   TEXT    NOT NULL DEFAULT 'deep',
    created_at      TEXT    NOT NULL,
    updated_at      TEXT    NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    job_data        TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);

CREATE TABLE IF NOT EXISTS results (
    job_id          TEXT    PRIMARY KEY REFERENCES jobs(id) ON DELETE CASCADE,
    created_at      TEXT    NOT NULL,
    result_data     TEXT    NOT NULL
);
"#;

fn legacy_schema_version() -> u32 {
    0
}

/// Job fields that are stored as JSON rather than as columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobData {
    /// Blobs written before versioning carry no version and read as 0.
    #[serde(default = "legacy_schema_version")]
    pub schema_version: u32,
    pub request: AnalysisRequest,
    #[serde(default)]
    pub progress_message: String,
    #[serde(default, alias = "error_message")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "result_file")]
    pub result_ref: Option<String>,
}

impl JobData {
    pub fn from_job(job: &Job) -> Self {
        Self {
            schema_version: JOB_SCHEMA_VERSION,
            request: job.request.clone(),
            progress_message: job.progress_message.clone(),
            error: job.error.clone(),
            started_at: job.started_at,
            completed_at: job.completed_at,
            result_ref: job.result_ref.clone(),
        }
    }

    pub fn into_job(self, id: Uuid, status: JobStatus, created_at: DateTime<Utc>) -> Job {
        Job {
            id,
            request: self.request,
            status,
            created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            progress_message: self.progress_message,
            error: self.error,
            result_ref: self.result_ref,
        }
    }
}

/// Formats a timestamp so that lexical order matches chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parses RFC 3339, falling back to offset-less ISO 8601 read as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// Rebuilds a job from its column values and blob.
pub fn decode_job(
    id: &str,
    status: &str,
    created_at: &str,
    job_data: &str,
) -> Result<Job, StoreError> {
    let id = Uuid::parse_str(id)
        .map_err(|e| StoreError::InvalidRecord(format!("bad job id '{}': {}", id, e)))?;
    let status = JobStatus::parse(status)
        .ok_or_else(|| StoreError::InvalidRecord(format!("unknown status '{}'", status)))?;
    let created_at = parse_timestamp(created_at).ok_or_else(|| {
        StoreError::InvalidRecord(format!("bad created_at '{}'", created_at))
    })?;
    let data: JobData = serde_json::from_str(job_data)?;
    Ok(data.into_job(id, status, created_at))
}
