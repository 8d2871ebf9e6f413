//! Prometheus metrics for the scheduler and the frontier orchestrator.
//!
//! ```ignore
//! use gapforge::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! MetricsCollector::new().record_job_submitted();
//! let text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    COLLABORATOR_FAILURES, GAPS_TOTAL, JOBS_FINISHED, JOBS_RUNNING, JOBS_SUBMITTED, JOBS_WAITING,
    JOB_DURATION, REGISTRY,
};
