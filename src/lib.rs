//! gapforge: research gap discovery over an expanding literature frontier.
//!
//! A seed paper's limitations and future-work statements become candidate
//! research gaps. The frontier orchestrator searches for papers that might
//! solve each gap, eliminates the solved ones, harvests new gaps from every
//! paper it reads, and promotes gaps that survive repeated validation. The
//! job scheduler runs these analyses as durable background jobs under a
//! concurrency bound.

pub mod cli;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod frontier;
pub mod llm;
pub mod metrics;
pub mod scheduler;
pub mod storage;
pub mod utils;

pub use error::{CollaboratorError, LlmError};
pub use frontier::{FrontierOrchestrator, GapAnalysisReport, OrchestratorError};
pub use scheduler::{AnalysisMode, AnalysisRequest, JobScheduler, JobStatus, SchedulerError};
pub use storage::{InMemoryJobStore, JobStore, SqliteJobStore, StoreError};
