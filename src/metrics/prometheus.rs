//! Prometheus metrics registration and export.
//!
//! This module defines all Prometheus metrics used by gapforge and provides
//! functions for initializing, registering, and exporting metrics.

use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all gapforge metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total number of accepted job submissions.
pub static JOBS_SUBMITTED: OnceLock<Counter> = OnceLock::new();

/// Jobs that reached a terminal state, labeled by status.
pub static JOBS_FINISHED: OnceLock<CounterVec> = OnceLock::new();

/// Job run time in seconds, labeled by analysis mode.
pub static JOB_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Number of jobs holding an admission slot.
pub static JOBS_RUNNING: OnceLock<Gauge> = OnceLock::new();

/// Number of jobs waiting for an admission slot.
pub static JOBS_WAITING: OnceLock<Gauge> = OnceLock::new();

/// Research gaps by outcome (discovered, validated, eliminated).
pub static GAPS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Absorbed collaborator failures, labeled by collaborator.
pub static COLLABORATOR_FAILURES: OnceLock<CounterVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls build a fresh set of metrics but leave
/// the first registered set in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails, typically due to
/// duplicate metric names or invalid metric configurations.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let jobs_submitted = Counter::new(
        "gapforge_jobs_submitted_total",
        "Total number of accepted job submissions",
    )?;

    let jobs_finished = CounterVec::new(
        Opts::new(
            "gapforge_jobs_finished_total",
            "Jobs that reached a terminal state",
        ),
        &["status"],
    )?;

    let job_duration = HistogramVec::new(
        HistogramOpts::new("gapforge_job_duration_seconds", "Job run time in seconds")
            .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0]),
        &["mode"],
    )?;

    let jobs_running = Gauge::new(
        "gapforge_jobs_running",
        "Number of jobs holding an admission slot",
    )?;

    let jobs_waiting = Gauge::new(
        "gapforge_jobs_waiting",
        "Number of jobs waiting for an admission slot",
    )?;

    let gaps_total = CounterVec::new(
        Opts::new("gapforge_gaps_total", "Research gaps by outcome"),
        &["outcome"],
    )?;

    let collaborator_failures = CounterVec::new(
        Opts::new(
            "gapforge_collaborator_failures_total",
            "Collaborator failures absorbed during exploration",
        ),
        &["collaborator"],
    )?;

    registry.register(Box::new(jobs_submitted.clone()))?;
    registry.register(Box::new(jobs_finished.clone()))?;
    registry.register(Box::new(job_duration.clone()))?;
    registry.register(Box::new(jobs_running.clone()))?;
    registry.register(Box::new(jobs_waiting.clone()))?;
    registry.register(Box::new(gaps_total.clone()))?;
    registry.register(Box::new(collaborator_failures.clone()))?;

    // Already-set cells mean metrics were initialized before; keep those.
    let _ = REGISTRY.set(registry);
    let _ = JOBS_SUBMITTED.set(jobs_submitted);
    let _ = JOBS_FINISHED.set(jobs_finished);
    let _ = JOB_DURATION.set(job_duration);
    let _ = JOBS_RUNNING.set(jobs_running);
    let _ = JOBS_WAITING.set(jobs_waiting);
    let _ = GAPS_TOTAL.set(gaps_total);
    let _ = COLLABORATOR_FAILURES.set(collaborator_failures);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// If the registry has not been initialized or encoding fails, returns a
/// comment line describing the problem.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics() {
        let result = init_metrics();
        assert!(result.is_ok() || REGISTRY.get().is_some());
    }

    #[test]
    fn test_export_after_init() {
        let _ = init_metrics();
        if let Some(counter) = JOBS_SUBMITTED.get() {
            counter.inc();
        }

        let metrics = export_metrics();
        assert!(!metrics.starts_with("# Error"));
        assert!(metrics.contains("gapforge_jobs_submitted_total"));
    }
}
