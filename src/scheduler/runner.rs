//! The job scheduler: submission, admission, execution and lookups.
//!
//! Every submitted job gets its own tokio task. The task waits for an
//! admission slot by polling the [`AdmissionGate`], runs the frontier
//! orchestrator, and writes the terminal status. All job state lives in the
//! [`JobStore`]; the task only keeps a working copy and writes each
//! transition through the store's guarded update before moving on.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::admission::AdmissionGate;
use super::error::SchedulerError;
use super::job::{AnalysisRequest, Job, JobStatus, JobStatusView, SubmissionReceipt};
use crate::frontier::{truncate_chars, ExplorationPhase, FrontierOrchestrator, ProgressReporter};
use crate::metrics::MetricsCollector;
use crate::storage::{JobStore, StoreError, StoredResult};

/// Default number of jobs allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 2;
/// Default sleep between admission attempts.
pub const DEFAULT_ADMISSION_POLL: Duration = Duration::from_secs(5);
/// Default and maximum page sizes of [`JobScheduler::list_recent`].
pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const MAX_LIST_LIMIT: usize = 100;
/// Error recorded on jobs found without a live task by [`JobScheduler::reconcile_stale`].
pub const INTERRUPTED_ERROR: &str = "interrupted before completion";

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of jobs running the orchestrator at once.
    pub max_concurrent_jobs: usize,
    /// How long a waiting job sleeps before retrying admission.
    pub admission_poll: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            admission_poll: DEFAULT_ADMISSION_POLL,
        }
    }
}

impl SchedulerConfig {
    /// Sets the concurrency bound.
    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Sets the admission poll interval.
    pub fn with_admission_poll(mut self, interval: Duration) -> Self {
        self.admission_poll = interval;
        self
    }
}

/// Snapshot of scheduler activity in this process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerStats {
    pub max_concurrent_jobs: usize,
    /// Jobs holding an admission slot.
    pub running: usize,
    /// Jobs whose task is waiting for a slot.
    pub waiting: usize,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    /// Mean run time of jobs that finished in this process.
    pub average_job_duration: Duration,
}

impl SchedulerStats {
    /// Returns the total number of jobs finished (completed + failed).
    pub fn total_finished(&self) -> u64 {
        self.jobs_completed + self.jobs_failed
    }
}

/// Outcome of a result lookup for an existing job.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultLookup {
    /// The stored report.
    Ready(StoredResult),
    /// Not admitted yet.
    Pending { progress_message: String },
    /// Still exploring; partial data is never exposed.
    Running { progress_message: String },
    /// Failed or cancelled.
    Failed { error: String },
}

impl ResultLookup {
    /// HTTP-style status code for callers that speak HTTP.
    pub fn status_code(&self) -> u16 {
        match self {
            ResultLookup::Ready(_) => 200,
            ResultLookup::Pending { .. } | ResultLookup::Running { .. } => 202,
            ResultLookup::Failed { .. } => 500,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ResultLookup::Ready(_))
    }
}

struct SharedStats {
    waiting: AtomicUsize,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl SharedStats {
    fn new() -> Self {
        Self {
            waiting: AtomicUsize::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
        }
    }

    fn record_finished(&self, status: JobStatus, duration: Duration) {
        match status {
            JobStatus::Completed => self.jobs_completed.fetch_add(1, Ordering::SeqCst),
            _ => self.jobs_failed.fetch_add(1, Ordering::SeqCst),
        };
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

/// Decrements the waiting counter when a task stops waiting, however it stops.
struct WaitingGuard<'a> {
    stats: &'a SharedStats,
    metrics: &'a MetricsCollector,
}

impl<'a> WaitingGuard<'a> {
    fn new(stats: &'a SharedStats, metrics: &'a MetricsCollector) -> Self {
        let waiting = stats.waiting.fetch_add(1, Ordering::SeqCst) + 1;
        metrics.set_jobs_waiting(waiting);
        Self { stats, metrics }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        let waiting = self.stats.waiting.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.metrics.set_jobs_waiting(waiting);
    }
}

struct SchedulerInner {
    config: SchedulerConfig,
    store: Arc<dyn JobStore>,
    orchestrator: Arc<FrontierOrchestrator>,
    admission: AdmissionGate,
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    stats: SharedStats,
    metrics: MetricsCollector,
}

impl SchedulerInner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<Uuid, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn has_live_task(&self, id: Uuid) -> bool {
        self.tasks().get(&id).is_some_and(|handle| !handle.is_finished())
    }
}

/// Accepts analysis requests and runs them under a concurrency bound.
///
/// Cheap to clone; clones share the same store, gate and task table.
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<SchedulerInner>,
}

impl JobScheduler {
    /// Creates a scheduler. Must be called inside a tokio runtime before
    /// jobs are submitted.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        orchestrator: Arc<FrontierOrchestrator>,
    ) -> Self {
        let admission = AdmissionGate::new(config.max_concurrent_jobs);
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                store,
                orchestrator,
                admission,
                tasks: Mutex::new(HashMap::new()),
                stats: SharedStats::new(),
                metrics: MetricsCollector::new(),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.inner.store
    }

    /// Validates and persists a new job, then schedules it. Never waits for
    /// the analysis itself.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if the request is out of bounds (nothing is stored),
    /// `Store` if the pending record cannot be written.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<SubmissionReceipt, SchedulerError> {
        request.validate()?;

        let job = Job::new(request);
        self.inner.store.upsert_job(&job).await?;
        let receipt = SubmissionReceipt::for_job(&job);

        info!(
            job_id = %job.id,
            mode = %job.request.analysis_mode,
            max_papers = job.request.max_papers,
            seed = %truncate_chars(&job.request.seed_reference, 80),
            "Job submitted"
        );
        self.inner.metrics.record_job_submitted();

        // The table lock is held across spawn so the task cannot finish and
        // deregister before its handle is inserted.
        let mut tasks = self.inner.tasks();
        let inner = Arc::clone(&self.inner);
        let id = job.id;
        let handle = tokio::spawn(async move {
            execute(&inner, job).await;
            inner.tasks().remove(&id);
        });
        tasks.insert(id, handle);

        Ok(receipt)
    }

    async fn load(&self, id: Uuid) -> Result<Job, SchedulerError> {
        self.inner
            .store
            .get_job(id)
            .await?
            .ok_or(SchedulerError::NotFound(id))
    }

    /// Read-only projection of a job.
    pub async fn get_status(&self, id: Uuid) -> Result<JobStatusView, SchedulerError> {
        Ok(self.load(id).await?.status_view())
    }

    /// Returns the report of a completed job or the reason there is none.
    pub async fn get_result(&self, id: Uuid) -> Result<ResultLookup, SchedulerError> {
        let job = self.load(id).await?;
        let lookup = match job.status {
            JobStatus::Pending => ResultLookup::Pending {
                progress_message: job.progress_message,
            },
            JobStatus::Running => ResultLookup::Running {
                progress_message: job.progress_message,
            },
            JobStatus::Failed => ResultLookup::Failed {
                error: job.error.unwrap_or_else(|| "unknown error".to_string()),
            },
            JobStatus::Completed => match self.inner.store.get_result(id).await? {
                Some(result) => ResultLookup::Ready(result),
                None => {
                    return Err(SchedulerError::Store(StoreError::InvalidRecord(format!(
                        "job {} is completed but has no result",
                        id
                    ))))
                }
            },
        };
        Ok(lookup)
    }

    /// Most recent jobs first. `None` means the default page size; larger
    /// limits are capped.
    pub async fn list_recent(&self, limit: Option<usize>) -> Result<Vec<JobStatusView>, SchedulerError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let jobs = self.inner.store.list_jobs(limit).await?;
        Ok(jobs.iter().map(Job::status_view).collect())
    }

    /// Marks a pending or running job as failed with "cancelled by user".
    ///
    /// A running orchestrator is not interrupted; its completion write is
    /// rejected by the store and the job stays failed.
    pub async fn cancel(&self, id: Uuid) -> Result<JobStatusView, SchedulerError> {
        let mut job = self.load(id).await?;
        if job.status.is_terminal() {
            return Err(SchedulerError::AlreadyTerminal {
                id,
                status: job.status,
            });
        }

        job.mark_cancelled();
        if !self.inner.store.update_job(&job).await? {
            // Finished between our read and write.
            let stored = self.load(id).await?;
            return Err(SchedulerError::AlreadyTerminal {
                id,
                status: stored.status,
            });
        }

        info!(job_id = %id, "Job cancelled");
        Ok(job.status_view())
    }

    /// Removes a job and its result. An in-flight task is aborted and
    /// awaited before the record is deleted.
    pub async fn delete(&self, id: Uuid) -> Result<(), SchedulerError> {
        let handle = self.inner.tasks().remove(&id);
        if let Some(handle) = handle {
            handle.abort();
            // Cancelled is the expected outcome; a finished task is fine too.
            let _ = handle.await;
            debug!(job_id = %id, "Aborted job task");
        }
        if !self.inner.store.delete_job(id).await? {
            return Err(SchedulerError::NotFound(id));
        }
        info!(job_id = %id, "Job deleted");
        Ok(())
    }

    /// Fails every stored pending or running job that has no live task in
    /// this process, typically left behind by a restart.
    pub async fn reconcile_stale(&self) -> Result<Vec<Uuid>, SchedulerError> {
        let mut reconciled = Vec::new();
        for mut job in self.inner.store.list_active_jobs().await? {
            if self.inner.has_live_task(job.id) {
                continue;
            }
            let previous = job.status;
            job.mark_failed(INTERRUPTED_ERROR);
            if self.inner.store.update_job(&job).await? {
                warn!(job_id = %job.id, previous = %previous, "Reconciled stale job");
                reconciled.push(job.id);
            }
        }
        Ok(reconciled)
    }

    /// Polls until the job is terminal and returns its final record.
    pub async fn wait_for_terminal(&self, id: Uuid, poll: Duration) -> Result<Job, SchedulerError> {
        loop {
            let job = self.load(id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll).await;
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        let stats = &self.inner.stats;
        let completed = stats.jobs_completed.load(Ordering::SeqCst);
        let failed = stats.jobs_failed.load(Ordering::SeqCst);
        let total_ms = stats.total_duration_ms.load(Ordering::SeqCst);
        let finished = completed + failed;

        SchedulerStats {
            max_concurrent_jobs: self.inner.admission.max(),
            running: self.inner.admission.running(),
            waiting: stats.waiting.load(Ordering::SeqCst),
            jobs_completed: completed,
            jobs_failed: failed,
            average_job_duration: if finished > 0 {
                Duration::from_millis(total_ms / finished)
            } else {
                Duration::ZERO
            },
        }
    }
}

/// Writes progress narration of one running job to the store.
struct JobProgress {
    store: Arc<dyn JobStore>,
    job: tokio::sync::Mutex<Job>,
}

#[async_trait]
impl ProgressReporter for JobProgress {
    async fn report(&self, phase: ExplorationPhase, message: String) {
        let mut job = self.job.lock().await;
        debug!(job_id = %job.id, phase = %phase, message = %message, "Progress");
        job.set_progress(message);
        match self.store.update_job(&job).await {
            Ok(true) => {}
            Ok(false) => debug!(job_id = %job.id, "Job already terminal, progress not written"),
            Err(e) => warn!(job_id = %job.id, error = %e, "Failed to persist progress"),
        }
    }
}

/// Returns true if the stored copy of the job is gone or terminal.
async fn no_longer_runnable(inner: &SchedulerInner, id: Uuid) -> bool {
    match inner.store.get_job(id).await {
        Ok(Some(stored)) => stored.status.is_terminal(),
        Ok(None) => true,
        Err(e) => {
            warn!(job_id = %id, error = %e, "Failed to re-read job");
            false
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn execute(inner: &SchedulerInner, mut job: Job) {
    let id = job.id;

    let slot = {
        let _waiting = WaitingGuard::new(&inner.stats, &inner.metrics);
        loop {
            if let Some(slot) = inner.admission.try_acquire() {
                break Some(slot);
            }
            if no_longer_runnable(inner, id).await {
                break None;
            }
            debug!(job_id = %id, "No admission slot free, waiting");
            tokio::time::sleep(inner.config.admission_poll).await;
        }
    };
    let Some(slot) = slot else {
        info!(job_id = %id, "Job left the queue before admission");
        return;
    };

    if no_longer_runnable(inner, id).await {
        info!(job_id = %id, "Job cancelled before start");
        return;
    }

    job.mark_running();
    match inner.store.update_job(&job).await {
        Ok(true) => {}
        Ok(false) => {
            info!(job_id = %id, "Job cancelled before start");
            return;
        }
        Err(e) => {
            error!(job_id = %id, error = %e, "Failed to mark job running");
            record_failure(inner, &mut job, format!("failed to mark job running: {}", e)).await;
            return;
        }
    }
    inner.metrics.set_jobs_running(inner.admission.running());
    info!(job_id = %id, "Job started");

    let started = Instant::now();
    let request = job.request.clone();
    let progress = JobProgress {
        store: Arc::clone(&inner.store),
        job: tokio::sync::Mutex::new(job),
    };

    let outcome = AssertUnwindSafe(inner.orchestrator.run(&request, &progress))
        .catch_unwind()
        .await;
    let mut job = progress.job.into_inner();

    let failure = match outcome {
        Ok(Ok(report)) => {
            let validated = report.validated_gaps.len();
            match serde_json::to_string(&report) {
                Ok(json) => match store_result(inner, id, json).await {
                    Ok(()) => {
                        job.mark_completed(validated);
                        None
                    }
                    Err(e) => Some(format!("failed to store result: {}", e)),
                },
                Err(e) => Some(format!("failed to serialize result: {}", e)),
            }
        }
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(format!("analysis panicked: {}", panic_message(payload.as_ref()))),
    };
    if let Some(message) = failure {
        job.mark_failed(message);
    }

    let elapsed = started.elapsed();
    match inner.store.update_job(&job).await {
        Ok(true) => {
            match job.status {
                JobStatus::Completed => info!(
                    job_id = %id,
                    duration_secs = elapsed.as_secs_f64(),
                    "Job completed"
                ),
                _ => error!(
                    job_id = %id,
                    error = job.error.as_deref().unwrap_or_default(),
                    "Job failed"
                ),
            }
            inner.stats.record_finished(job.status, elapsed);
            inner.metrics.record_job_finished(
                job.status.as_str(),
                job.request.analysis_mode.to_string().as_str(),
                elapsed.as_secs_f64(),
            );
        }
        Ok(false) => info!(job_id = %id, "Job was cancelled while running, outcome discarded"),
        Err(e) => {
            error!(job_id = %id, error = %e, "Failed to persist terminal status");
            record_failure(inner, &mut job, format!("failed to persist terminal status: {}", e))
                .await;
        }
    }

    drop(slot);
    inner.metrics.set_jobs_running(inner.admission.running());
}

/// One best-effort attempt to leave the job `Failed` after a store error.
/// If this write fails too, `reconcile_stale` is the recovery path.
async fn record_failure(inner: &SchedulerInner, job: &mut Job, message: String) {
    job.mark_failed(message);
    if let Err(e) = inner.store.update_job(job).await {
        error!(job_id = %job.id, error = %e, "Failed to record job failure");
    }
}

/// Writes the report unless the job was cancelled meanwhile.
async fn store_result(inner: &SchedulerInner, id: Uuid, json: String) -> Result<(), StoreError> {
    if no_longer_runnable(inner, id).await {
        return Ok(());
    }
    inner.store.upsert_result(&StoredResult::new(id, json)).await
}
