//! High-level recording interface over the raw Prometheus metrics.
//!
//! Every method is a no-op for metrics that were never initialized, so
//! library code can record unconditionally and tests need no setup.

use super::prometheus::{
    COLLABORATOR_FAILURES, GAPS_TOTAL, JOBS_FINISHED, JOBS_RUNNING, JOBS_SUBMITTED, JOBS_WAITING,
    JOB_DURATION,
};

/// Metrics collector for scheduler and orchestrator events.
///
/// # Example
///
/// ```ignore
/// use gapforge::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics()?;
/// let collector = MetricsCollector::new();
/// collector.record_job_submitted();
/// collector.record_job_finished("completed", "deep", 412.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record an accepted submission.
    pub fn record_job_submitted(&self) {
        if let Some(submitted) = JOBS_SUBMITTED.get() {
            submitted.inc();
        }
        tracing::trace!("Recorded job submission metric");
    }

    /// Record a job reaching a terminal state.
    ///
    /// # Arguments
    ///
    /// * `status` - Terminal status ("completed" or "failed")
    /// * `mode` - Analysis mode ("light" or "deep")
    /// * `duration_secs` - Time from admission to the terminal write
    pub fn record_job_finished(&self, status: &str, mode: &str, duration_secs: f64) {
        if let Some(finished) = JOBS_FINISHED.get() {
            finished.with_label_values(&[status]).inc();
        }

        if let Some(duration) = JOB_DURATION.get() {
            duration.with_label_values(&[mode]).observe(duration_secs);
        }

        tracing::trace!(
            status = status,
            mode = mode,
            duration_secs = duration_secs,
            "Recorded job metric"
        );
    }

    /// Update the number of jobs holding an admission slot.
    pub fn set_jobs_running(&self, count: usize) {
        if let Some(running) = JOBS_RUNNING.get() {
            running.set(count as f64);
        }
    }

    /// Update the number of jobs waiting for admission.
    pub fn set_jobs_waiting(&self, count: usize) {
        if let Some(waiting) = JOBS_WAITING.get() {
            waiting.set(count as f64);
        }
    }

    /// Count gaps with the given outcome ("discovered", "validated", "eliminated").
    pub fn record_gaps(&self, outcome: &str, count: usize) {
        if count == 0 {
            return;
        }
        if let Some(gaps) = GAPS_TOTAL.get() {
            gaps.with_label_values(&[outcome]).inc_by(count as f64);
        }
    }

    /// Count a collaborator failure that exploration absorbed.
    pub fn record_collaborator_failure(&self, collaborator: &str) {
        if let Some(failures) = COLLABORATOR_FAILURES.get() {
            failures.with_label_values(&[collaborator]).inc();
        }
        tracing::trace!(collaborator = collaborator, "Recorded collaborator failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::init_metrics;

    #[test]
    fn test_recording_without_init_is_noop() {
        let collector = MetricsCollector::new();
        collector.record_job_submitted();
        collector.record_gaps("validated", 2);
        collector.set_jobs_waiting(0);
    }

    #[test]
    fn test_record_after_init() {
        let _ = init_metrics();
        let collector = MetricsCollector::new();

        collector.record_job_finished("completed", "deep", 120.5);
        collector.record_job_finished("failed", "light", 3.0);
        collector.record_gaps("discovered", 4);
        collector.record_collaborator_failure("search");
        collector.set_jobs_running(2);

        if let Some(gaps) = GAPS_TOTAL.get() {
            assert!(gaps.with_label_values(&["discovered"]).get() >= 4.0);
        }
    }
}
