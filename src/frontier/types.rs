//! Papers, gaps and the records produced about them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collaborators::Verdict;

const SHORT_DESCRIPTION_CHARS: usize = 50;

/// Structured findings extracted from one paper.
///
/// Immutable once produced; the frontier state deduplicates papers by
/// `reference`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// URL or synthetic id.
    pub reference: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub limitations: Vec<String>,
    #[serde(default)]
    pub future_work: Vec<String>,
}

impl PaperRecord {
    pub fn new(reference: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    pub fn with_limitation(mut self, statement: impl Into<String>) -> Self {
        self.limitations.push(statement.into());
        self
    }

    pub fn with_future_work(mut self, statement: impl Into<String>) -> Self {
        self.future_work.push(statement.into());
        self
    }

    pub fn with_key_finding(mut self, finding: impl Into<String>) -> Self {
        self.key_findings.push(finding.into());
        self
    }

    /// All text fields joined, for keyword search.
    pub fn searchable_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.abstract_text.as_str()];
        parts.extend(self.key_findings.iter().map(String::as_str));
        parts.extend(self.methods.iter().map(String::as_str));
        parts.extend(self.limitations.iter().map(String::as_str));
        parts.extend(self.future_work.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Where a gap statement came from in its source paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GapCategory {
    Limitation,
    FutureWork,
}

impl fmt::Display for GapCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapCategory::Limitation => write!(f, "Limitation"),
            GapCategory::FutureWork => write!(f, "Future Work"),
        }
    }
}

/// A claimed unresolved limitation or future-work statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchGap {
    pub id: String,
    pub description: String,
    pub source_reference: String,
    pub source_title: String,
    pub category: GapCategory,
    /// Inconclusive validation attempts survived so far. Only ever increases.
    pub strikes: u32,
    pub created_at: DateTime<Utc>,
}

impl ResearchGap {
    /// Creates a gap with a short random id and zero strikes.
    pub fn new(description: impl Into<String>, source: &PaperRecord, category: GapCategory) -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            id,
            description: description.into(),
            source_reference: source.reference.clone(),
            source_title: source.title.clone(),
            category,
            strikes: 0,
            created_at: Utc::now(),
        }
    }

    /// First 50 characters of the description.
    pub fn short_description(&self) -> String {
        truncate_chars(&self.description, SHORT_DESCRIPTION_CHARS)
    }

    pub fn add_strike(&mut self) {
        self.strikes += 1;
    }
}

/// Returns at most `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Heuristic research metrics attached to a validated gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapMetrics {
    /// 0–10.
    pub difficulty_score: f64,
    /// 0–10.
    pub innovation_potential: f64,
    /// 0–10.
    pub commercial_viability: f64,
    pub time_to_solution: String,
    /// 0–100.
    pub funding_likelihood: f64,
    /// 0–10.
    pub collaboration_score: f64,
    /// 0–10.
    pub ethical_considerations: f64,
}

/// A gap that survived enough validation strikes, enriched for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedGap {
    pub gap_id: String,
    pub title: String,
    pub description: String,
    pub category: GapCategory,
    /// Primary research domain named by the enrichment collaborator.
    pub research_area: String,
    pub source_reference: String,
    pub source_title: String,
    pub validation_evidence: String,
    pub potential_impact: String,
    pub suggested_approaches: Vec<String>,
    pub metrics: GapMetrics,
    pub validation_attempts: u32,
    pub papers_checked: usize,
    /// 0–100.
    pub confidence_score: f64,
    pub estimated_researcher_years: f64,
    pub recommended_team_size: String,
    pub key_milestones: Vec<String>,
    pub opportunity_tags: Vec<String>,
    pub validated_at: DateTime<Utc>,
}

/// Why a gap left the active set without being promoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EliminatedGap {
    pub gap_id: String,
    pub description: String,
    pub category: GapCategory,
    /// References of the papers the verdict was based on.
    pub evidence_references: Vec<String>,
    pub verdict: Verdict,
    /// 0–1, as reported by the classifier.
    pub confidence: f64,
    pub rationale: String,
    pub during_phase: ExplorationPhase,
}

/// Phase of the frontier algorithm in which something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplorationPhase {
    Seeding,
    Expansion,
    Validation,
    Synthesis,
}

impl fmt::Display for ExplorationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplorationPhase::Seeding => write!(f, "seeding"),
            ExplorationPhase::Expansion => write!(f, "expansion"),
            ExplorationPhase::Validation => write!(f, "validation"),
            ExplorationPhase::Synthesis => write!(f, "synthesis"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_ids_are_short_and_unique() {
        let paper = PaperRecord::new("p1", "Paper");
        let a = ResearchGap::new("first gap statement", &paper, GapCategory::Limitation);
        let b = ResearchGap::new("second gap statement", &paper, GapCategory::FutureWork);

        assert_eq!(a.id.len(), 8);
        assert_ne!(a.id, b.id);
        assert_eq!(a.strikes, 0);
        assert_eq!(a.source_title, "Paper");
    }

    #[test]
    fn test_short_description_respects_char_boundaries() {
        let paper = PaperRecord::new("p1", "Paper");
        let text = "é".repeat(80);
        let gap = ResearchGap::new(text, &paper, GapCategory::Limitation);

        assert_eq!(gap.short_description().chars().count(), 50);
    }

    #[test]
    fn test_paper_record_deserializes_with_missing_fields() {
        let json = r#"{"reference": "ref-1", "abstract": "We study things."}"#;
        let paper: PaperRecord = serde_json::from_str(json).unwrap();

        assert_eq!(paper.abstract_text, "We study things.");
        assert!(paper.limitations.is_empty());
        assert!(paper.searchable_text().contains("study"));
    }

    #[test]
    fn test_category_display() {
        assert_eq!(GapCategory::Limitation.to_string(), "Limitation");
        assert_eq!(GapCategory::FutureWork.to_string(), "Future Work");
    }
}
