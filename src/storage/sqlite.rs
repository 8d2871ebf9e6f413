//! SQLite-backed job store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::scheduler::Job;

use super::schema::{decode_job, format_timestamp, parse_timestamp, JobData, SCHEMA_SQL};
use super::{JobStore, StoreError, StoredResult};

const UPSERT_JOB_SQL: &str = "INSERT INTO jobs (id, status, analysis_mode, created_at, updated_at, job_data)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(id) DO UPDATE SET
        status = excluded.status,
        analysis_mode = excluded.analysis_mode,
        updated_at = excluded.updated_at,
        job_data = excluded.job_data
    WHERE jobs.status NOT IN ('completed', 'failed')";

const UPDATE_JOB_SQL: &str = "UPDATE jobs SET
        status = ?2,
        analysis_mode = ?3,
        updated_at = ?4,
        job_data = ?5
    WHERE id = ?1 AND status NOT IN ('completed', 'failed')";

/// Job store persisted in a single SQLite file.
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        info!(path = path, "Job store opened");
        Ok(Self { pool })
    }

    fn row_to_job(row: &SqliteRow) -> Result<Job, StoreError> {
        let id: String = row.get("id");
        let status: String = row.get("status");
        let created_at: String = row.get("created_at");
        let job_data: String = row.get("job_data");
        decode_job(&id, &status, &created_at, &job_data)
    }

    fn rows_to_jobs(rows: Vec<SqliteRow>) -> Vec<Job> {
        rows.iter()
            .filter_map(|row| match Self::row_to_job(row) {
                Ok(job) => Some(job),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable job record");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn upsert_job(&self, job: &Job) -> Result<bool, StoreError> {
        let job_data = serde_json::to_string(&JobData::from_job(job))?;

        let result = sqlx::query(UPSERT_JOB_SQL)
            .bind(job.id.to_string())
            .bind(job.status.as_str())
            .bind(job.request.analysis_mode.to_string())
            .bind(format_timestamp(&job.created_at))
            .bind(format_timestamp(&Utc::now()))
            .bind(job_data)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_job(&self, job: &Job) -> Result<bool, StoreError> {
        let job_data = serde_json::to_string(&JobData::from_job(job))?;

        let result = sqlx::query(UPDATE_JOB_SQL)
            .bind(job.id.to_string())
            .bind(job.status.as_str())
            .bind(job.request.analysis_mode.to_string())
            .bind(format_timestamp(&Utc::now()))
            .bind(job_data)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT id, status, created_at, job_data FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }

    async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, status, created_at, job_data FROM jobs
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::rows_to_jobs(rows))
    }

    async fn list_active_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, status, created_at, job_data FROM jobs
             WHERE status IN ('pending', 'running') ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Self::rows_to_jobs(rows))
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM results WHERE job_id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn upsert_result(&self, result: &StoredResult) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO results (job_id, created_at, result_data) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id) DO UPDATE SET
                created_at = excluded.created_at,
                result_data = excluded.result_data",
        )
        .bind(result.job_id.to_string())
        .bind(format_timestamp(&result.created_at))
        .bind(&result.report_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_result(&self, job_id: Uuid) -> Result<Option<StoredResult>, StoreError> {
        let row = sqlx::query("SELECT created_at, result_data FROM results WHERE job_id = ?1")
            .bind(job_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: String = row.get("created_at");
        Ok(Some(StoredResult {
            job_id,
            created_at: parse_timestamp(&created_at).ok_or_else(|| {
                StoreError::InvalidRecord(format!("bad result created_at '{}'", created_at))
            })?,
            report_json: row.get("result_data"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{AnalysisRequest, JobStatus};

    async fn open_temp() -> (tempfile::TempDir, SqliteJobStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");
        let store = SqliteJobStore::open(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (_dir, store) = open_temp().await;
        let mut job = Job::new(AnalysisRequest::new("https://example.org/seed"));

        assert!(store.upsert_job(&job).await.unwrap());
        job.mark_running();
        job.set_progress("Phase 2: Expanding research frontier...");
        assert!(store.upsert_job(&job).await.unwrap());

        let loaded = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
        assert_eq!(loaded.progress_message, "Phase 2: Expanding research frontier...");
        assert_eq!(loaded.request, job.request);
        assert_eq!(store.list_jobs(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_records_are_not_overwritten() {
        let (_dir, store) = open_temp().await;
        let mut job = Job::new(AnalysisRequest::new("seed"));
        store.upsert_job(&job).await.unwrap();

        let mut cancelled = job.clone();
        cancelled.mark_cancelled();
        assert!(store.upsert_job(&cancelled).await.unwrap());

        job.mark_running();
        assert!(!store.upsert_job(&job).await.unwrap());

        let loaded = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("cancelled by user"));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let (_dir, store) = open_temp().await;
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut job = Job::new(AnalysisRequest::new(format!("seed-{}", i)));
            job.created_at = job.created_at + chrono::Duration::seconds(i);
            store.upsert_job(&job).await.unwrap();
            ids.push(job.id);
        }

        let listed: Vec<Uuid> = store
            .list_jobs(2)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(listed, vec![ids[2], ids[1]]);
    }

    #[tokio::test]
    async fn test_results_and_delete() {
        let (_dir, store) = open_temp().await;
        let job = Job::new(AnalysisRequest::new("seed"));
        store.upsert_job(&job).await.unwrap();

        let result = StoredResult::new(job.id, r#"{"validatedGaps":[]}"#.to_string());
        store.upsert_result(&result).await.unwrap();
        store.upsert_result(&result).await.unwrap();

        let loaded = store.get_result(job.id).await.unwrap().unwrap();
        assert_eq!(loaded.report_json, result.report_json);

        assert!(store.delete_job(job.id).await.unwrap());
        assert!(store.get_job(job.id).await.unwrap().is_none());
        assert!(store.get_result(job.id).await.unwrap().is_none());
        assert!(!store.delete_job(job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_never_recreates_deleted_job() {
        let (_dir, store) = open_temp().await;
        let mut job = Job::new(AnalysisRequest::new("seed"));
        store.upsert_job(&job).await.unwrap();

        job.mark_running();
        assert!(store.update_job(&job).await.unwrap());
        assert!(store.delete_job(job.id).await.unwrap());

        job.set_progress("Phase 2: Exploring gap 1/10: late write...");
        assert!(!store.update_job(&job).await.unwrap());
        assert!(store.get_job(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_respects_terminal_status() {
        let (_dir, store) = open_temp().await;
        let mut job = Job::new(AnalysisRequest::new("seed"));
        store.upsert_job(&job).await.unwrap();

        job.mark_cancelled();
        assert!(store.update_job(&job).await.unwrap());
        job.mark_completed(1);
        assert!(!store.update_job(&job).await.unwrap());
        assert_eq!(
            store.get_job(job.id).await.unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_list_active_jobs() {
        let (_dir, store) = open_temp().await;
        let pending = Job::new(AnalysisRequest::new("a"));
        let mut done = Job::new(AnalysisRequest::new("b"));
        done.mark_failed("boom");
        store.upsert_job(&pending).await.unwrap();
        store.upsert_job(&done).await.unwrap();

        let active = store.list_active_jobs().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, pending.id);
    }
}
