//! In-memory job store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::scheduler::Job;

use super::{JobStore, StoreError, StoredResult};

#[derive(Default)]
struct Tables {
    jobs: HashMap<Uuid, (u64, Job)>,
    results: HashMap<Uuid, StoredResult>,
    next_seq: u64,
}

/// Process-local job store with the same write contract as the SQLite store.
#[derive(Default)]
pub struct InMemoryJobStore {
    tables: Mutex<Tables>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // Poisoning is ignored: every write is a single insert or remove.
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn upsert_job(&self, job: &Job) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let seq = match tables.jobs.get(&job.id) {
            Some((_, stored)) if stored.status.is_terminal() => return Ok(false),
            Some((seq, _)) => *seq,
            None => {
                tables.next_seq += 1;
                tables.next_seq
            }
        };
        tables.jobs.insert(job.id, (seq, job.clone()));
        Ok(true)
    }

    async fn update_job(&self, job: &Job) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        match tables.jobs.get_mut(&job.id) {
            Some((_, stored)) if !stored.status.is_terminal() => {
                *stored = job.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.lock().jobs.get(&id).map(|(_, job)| job.clone()))
    }

    async fn list_jobs(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let tables = self.lock();
        let mut jobs: Vec<&(u64, Job)> = tables.jobs.values().collect();
        jobs.sort_by(|a, b| {
            b.1.created_at
                .cmp(&a.1.created_at)
                .then_with(|| b.0.cmp(&a.0))
        });
        Ok(jobs
            .into_iter()
            .take(limit)
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn list_active_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let tables = self.lock();
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|(_, job)| !job.status.is_terminal())
            .map(|(_, job)| job.clone())
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        tables.results.remove(&id);
        Ok(tables.jobs.remove(&id).is_some())
    }

    async fn upsert_result(&self, result: &StoredResult) -> Result<(), StoreError> {
        self.lock().results.insert(result.job_id, result.clone());
        Ok(())
    }

    async fn get_result(&self, job_id: Uuid) -> Result<Option<StoredResult>, StoreError> {
        Ok(self.lock().results.get(&job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{AnalysisRequest, JobStatus};

    #[tokio::test]
    async fn test_guarded_upsert() {
        let store = InMemoryJobStore::new();
        let mut job = Job::new(AnalysisRequest::new("seed"));
        assert!(store.upsert_job(&job).await.unwrap());

        job.mark_completed(0);
        assert!(store.upsert_job(&job).await.unwrap());

        let mut late = job.clone();
        late.mark_failed("late failure");
        assert!(!store.upsert_job(&late).await.unwrap());
        assert_eq!(
            store.get_job(job.id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_update_skips_missing_and_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let mut job = Job::new(AnalysisRequest::new("seed"));
        assert!(!store.update_job(&job).await.unwrap());
        assert!(store.get_job(job.id).await.unwrap().is_none());

        store.upsert_job(&job).await.unwrap();
        job.mark_running();
        assert!(store.update_job(&job).await.unwrap());

        store.delete_job(job.id).await.unwrap();
        assert!(!store.update_job(&job).await.unwrap());
        assert!(store.get_job(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_limit_and_order() {
        let store = InMemoryJobStore::new();
        let first = Job::new(AnalysisRequest::new("first"));
        let mut second = Job::new(AnalysisRequest::new("second"));
        second.created_at = first.created_at;
        store.upsert_job(&first).await.unwrap();
        store.upsert_job(&second).await.unwrap();

        let listed = store.list_jobs(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, second.id);
    }
}
