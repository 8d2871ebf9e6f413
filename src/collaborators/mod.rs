//! Interfaces to the external collaborators of the frontier orchestrator.
//!
//! The orchestrator only ever talks to three traits:
//!
//! - **PaperAnalyzer**: reference → [`PaperRecord`]
//! - **SearchProvider**: queries → candidate references, plus the query
//!   helpers that phrase elimination and expansion searches for a gap
//! - **EvidenceClassifier**: decides whether papers resolve a gap and
//!   enriches gaps that survive validation
//!
//! Implementations shipped here:
//!
//! - [`LocalCorpus`]: JSON corpus of pre-analyzed papers with keyword search
//! - [`ConservativeClassifier`]: never eliminates, heuristic enrichment
//! - [`LlmEvidenceClassifier`]: asks an [`LlmProvider`](crate::llm::LlmProvider) for verdicts

pub mod corpus;
pub mod heuristics;
pub mod llm_classifier;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;
use crate::frontier::{PaperRecord, ResearchGap, ValidatedGap};

pub use corpus::LocalCorpus;
pub use heuristics::{
    analyze_text, extract_search_terms, fallback_enrichment, fallback_validation_queries,
    ConservativeClassifier,
};
pub use llm_classifier::LlmEvidenceClassifier;

/// Confidence at or above which a partial match eliminates a gap.
pub const DEFAULT_PARTIAL_ELIMINATION_CONFIDENCE: f64 = 0.8;

/// Turns a paper reference into structured findings.
#[async_trait]
pub trait PaperAnalyzer: Send + Sync {
    async fn analyze(&self, reference: &str) -> Result<PaperRecord, CollaboratorError>;
}

/// Literature search and the query phrasing used for it.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Runs every query and returns candidate references, at most
    /// `limit_per_query` per query. Order is preserved; duplicates allowed.
    async fn search(
        &self,
        queries: &[String],
        limit_per_query: usize,
    ) -> Result<Vec<String>, CollaboratorError>;

    /// Queries aimed at papers that might solve `gap`.
    async fn validation_queries(&self, gap: &ResearchGap) -> Result<Vec<String>, CollaboratorError>;

    /// Queries aimed at papers in the same research area as `gap`.
    async fn related_queries(&self, gap: &ResearchGap) -> Result<Vec<String>, CollaboratorError>;
}

/// Judges evidence against gaps.
#[async_trait]
pub trait EvidenceClassifier: Send + Sync {
    /// Decides whether `papers` resolve `gap`.
    async fn classify(
        &self,
        gap: &ResearchGap,
        papers: &[PaperRecord],
    ) -> Result<Classification, CollaboratorError>;

    /// Builds the report entry for a gap that reached its strike threshold.
    async fn enrich(
        &self,
        gap: &ResearchGap,
        papers_checked: usize,
    ) -> Result<ValidatedGap, CollaboratorError>;
}

/// Three-valued classifier outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Solved,
    PartiallyAddressed,
    NotAddressed,
}

impl Verdict {
    /// Parses loosely formatted verdict names ("solved", "Partially Addressed", "NOT_ADDRESSED").
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "solved" => Some(Verdict::Solved),
            "partially_addressed" | "partial" => Some(Verdict::PartiallyAddressed),
            "not_addressed" | "unsolved" => Some(Verdict::NotAddressed),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Solved => write!(f, "solved"),
            Verdict::PartiallyAddressed => write!(f, "partially_addressed"),
            Verdict::NotAddressed => write!(f, "not_addressed"),
        }
    }
}

/// A verdict with its confidence (0–1) and a short justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub verdict: Verdict,
    pub confidence: f64,
    #[serde(default)]
    pub rationale: String,
}

impl Classification {
    pub fn new(verdict: Verdict, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            verdict,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: rationale.into(),
        }
    }

    pub fn solved(confidence: f64) -> Self {
        Self::new(Verdict::Solved, confidence, "")
    }

    pub fn not_addressed() -> Self {
        Self::new(Verdict::NotAddressed, 0.0, "")
    }

    /// Elimination contract: `Solved` always eliminates, `PartiallyAddressed`
    /// eliminates at or above `partial_threshold`, `NotAddressed` never does.
    pub fn eliminates(&self, partial_threshold: f64) -> bool {
        match self.verdict {
            Verdict::Solved => true,
            Verdict::PartiallyAddressed => self.confidence >= partial_threshold,
            Verdict::NotAddressed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elimination_contract() {
        let threshold = DEFAULT_PARTIAL_ELIMINATION_CONFIDENCE;

        assert!(Classification::solved(0.1).eliminates(threshold));
        assert!(Classification::new(Verdict::PartiallyAddressed, 0.8, "").eliminates(threshold));
        assert!(!Classification::new(Verdict::PartiallyAddressed, 0.79, "").eliminates(threshold));
        assert!(!Classification::new(Verdict::NotAddressed, 1.0, "").eliminates(threshold));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(Classification::new(Verdict::Solved, 3.0, "").confidence, 1.0);
        assert_eq!(Classification::new(Verdict::Solved, -1.0, "").confidence, 0.0);
    }

    #[test]
    fn test_verdict_parse() {
        assert_eq!(Verdict::parse("SOLVED"), Some(Verdict::Solved));
        assert_eq!(
            Verdict::parse("Partially Addressed"),
            Some(Verdict::PartiallyAddressed)
        );
        assert_eq!(Verdict::parse("not-addressed"), Some(Verdict::NotAddressed));
        assert_eq!(Verdict::parse("maybe"), None);
    }

    #[test]
    fn test_verdict_serde_names() {
        let json = serde_json::to_string(&Verdict::PartiallyAddressed).unwrap();
        assert_eq!(json, "\"partially_addressed\"");
    }
}
