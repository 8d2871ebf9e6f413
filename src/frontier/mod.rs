//! Frontier exploration: gap and paper types, per-job state, the four-phase
//! orchestrator and the synthesis report.

pub mod orchestrator;
pub mod state;
pub mod synthesis;
pub mod types;

pub use orchestrator::{
    FrontierOrchestrator, NoopProgress, OrchestratorConfig, OrchestratorError, ProgressReporter,
};
pub use state::{FrontierCounters, FrontierState};
pub use synthesis::{
    synthesize, ExecutiveSummary, FrontierStats, GapAnalysisReport, ProcessMetadata,
    QualityScores, ResearchLandscape, ANALYSIS_VERSION,
};
pub use types::{
    truncate_chars, EliminatedGap, ExplorationPhase, GapCategory, GapMetrics, PaperRecord,
    ResearchGap, ValidatedGap,
};
