//! Model-free fallbacks: text analysis, query phrasing and gap enrichment.
//!
//! These are used when no LLM is configured, and as the safety net when an
//! LLM-backed collaborator fails on enrichment.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::CollaboratorError;
use crate::frontier::{truncate_chars, GapMetrics, PaperRecord, ResearchGap, ValidatedGap};

use super::{Classification, EvidenceClassifier, Verdict};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "are", "was", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "that", "which", "who",
    "where", "when", "why", "how", "this", "these", "those", "often", "always", "never",
    "sometimes", "usually", "frequently",
];

const LIMITATION_CUES: &[&str] = &[
    "however", "limitation", "challenge", "difficult", "unable", "cannot", "fail",
];
const FUTURE_CUES: &[&str] = &["future", "further", "next", "improve", "extend", "explore"];
const LIMITATION_SECTIONS: &[&str] = &["conclusion", "discussion", "limitations", "challenges"];

const MIN_STATEMENT_CHARS: usize = 30;
const MAX_STATEMENTS: usize = 4;
const ABSTRACT_CHARS: usize = 500;

/// Up to five lowercase key terms of three or more letters, stop words removed.
pub fn extract_search_terms(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let terms: Vec<String> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.len() >= 3 && word.chars().all(|c| c.is_ascii_alphabetic()))
        .filter(|word| !STOP_WORDS.contains(word))
        .take(5)
        .map(str::to_string)
        .collect();

    if terms.is_empty() {
        vec!["research".to_string(), "method".to_string()]
    } else {
        terms
    }
}

/// Queries phrased to find papers that would solve `gap`.
pub fn fallback_validation_queries(gap: &ResearchGap) -> Vec<String> {
    let short = gap.short_description();
    vec![
        format!("solving {}", short),
        format!("addressing {}", short),
        format!("solution for {}", short),
    ]
}

/// Queries phrased to find papers in the same area as `gap`.
pub fn fallback_related_queries(gap: &ResearchGap) -> Vec<String> {
    let terms = extract_search_terms(&gap.description);
    let second = terms.get(1).map(String::as_str).unwrap_or("method");
    vec![
        terms.iter().take(3).cloned().collect::<Vec<_>>().join(" "),
        format!("{} {}", terms[0], second),
    ]
}

/// Text following the first `keyword`, up to its next occurrence, capped at `max_chars`.
///
/// `lower` must be the ASCII-lowercased `text` so byte offsets line up.
fn section_after(text: &str, lower: &str, keyword: &str, max_chars: usize) -> Option<String> {
    let start = lower.find(keyword)? + keyword.len();
    let end = lower[start..]
        .find(keyword)
        .map(|offset| start + offset)
        .unwrap_or(text.len());
    Some(truncate_chars(&text[start..end], max_chars))
}

fn sentences(section: &str, max: usize) -> impl Iterator<Item = &str> {
    section.split('.').take(max).map(str::trim)
}

fn contains_any(sentence: &str, cues: &[&str]) -> bool {
    let lower = sentence.to_lowercase();
    cues.iter().any(|cue| lower.contains(cue))
}

fn dedup_capped(statements: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    statements
        .into_iter()
        .filter(|s| s.chars().count() > MIN_STATEMENT_CHARS)
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(MAX_STATEMENTS)
        .collect()
}

fn detect_title(text: &str) -> String {
    text.lines()
        .take(15)
        .map(str::trim)
        .find(|line| {
            line.chars().count() > 15
                && !line.starts_with("arXiv:")
                && line.chars().any(|c| c.is_lowercase())
        })
        .unwrap_or("Unknown Title")
        .to_string()
}

/// Keyword-driven extraction of limitations and future work from raw paper text.
pub fn analyze_text(reference: &str, text: &str) -> PaperRecord {
    let lower = text.to_ascii_lowercase();

    let mut limitations = Vec::new();
    if let Some(section) = section_after(text, &lower, "limitation", 1000) {
        limitations.extend(sentences(&section, 5).map(str::to_string));
    }
    for name in LIMITATION_SECTIONS {
        if let Some(section) = section_after(text, &lower, name, 1500) {
            limitations.extend(
                sentences(&section, 8)
                    .filter(|s| contains_any(s, LIMITATION_CUES))
                    .map(str::to_string),
            );
        }
    }

    let mut future_work = Vec::new();
    if let Some(section) = section_after(text, &lower, "future work", 1000) {
        future_work.extend(sentences(&section, 5).map(str::to_string));
    }
    if let Some(section) = section_after(text, &lower, "conclusion", 1500) {
        future_work.extend(
            sentences(&section, 8)
                .filter(|s| contains_any(s, FUTURE_CUES))
                .map(str::to_string),
        );
    }

    let abstract_text = if text.chars().count() > ABSTRACT_CHARS {
        format!("{}...", truncate_chars(text, ABSTRACT_CHARS))
    } else {
        text.to_string()
    };

    PaperRecord {
        reference: reference.to_string(),
        title: detect_title(text),
        abstract_text,
        key_findings: Vec::new(),
        methods: Vec::new(),
        limitations: dedup_capped(limitations),
        future_work: dedup_capped(future_work),
    }
}

/// Deterministic enrichment derived from the gap description alone.
pub fn fallback_enrichment(gap: &ResearchGap, papers_checked: usize) -> ValidatedGap {
    let chars = gap.description.chars().count() as f64;
    let words = gap.description.split_whitespace().count();
    let wc = words as f64;

    let metrics = GapMetrics {
        difficulty_score: (5.0 + wc / 20.0).clamp(4.0, 8.0),
        innovation_potential: (7.0 + chars / 100.0).clamp(6.0, 9.0),
        commercial_viability: (5.5 + wc / 30.0).clamp(4.0, 8.0),
        time_to_solution: format!("{}-{} years", (words / 10).max(1), (words / 8).max(2)),
        funding_likelihood: (60.0 + wc * 2.0).clamp(50.0, 90.0),
        collaboration_score: (5.0 + wc / 15.0).clamp(4.0, 9.0),
        ethical_considerations: (3.0 + wc / 25.0).clamp(2.0, 7.0),
    };

    ValidatedGap {
        gap_id: gap.id.clone(),
        title: truncate_chars(&gap.description, 100),
        description: gap.description.clone(),
        category: gap.category,
        research_area: "Research Opportunity".to_string(),
        source_reference: gap.source_reference.clone(),
        source_title: gap.source_title.clone(),
        validation_evidence: format!(
            "Survived {} validation attempt(s) without a resolving paper",
            gap.strikes
        ),
        potential_impact: "Significant research opportunity identified".to_string(),
        suggested_approaches: vec![
            "Detailed analysis required".to_string(),
            "Empirical investigation".to_string(),
            "Theoretical exploration".to_string(),
        ],
        metrics,
        validation_attempts: gap.strikes,
        papers_checked,
        confidence_score: 75.0,
        estimated_researcher_years: 3.0,
        recommended_team_size: "3-5 researchers".to_string(),
        key_milestones: vec!["Research phase".to_string(), "Validation phase".to_string()],
        opportunity_tags: vec!["Research Opportunity".to_string()],
        validated_at: Utc::now(),
    }
}

/// Classifier that never eliminates.
///
/// Without an evidence model there is nothing to justify removing a gap, so
/// every gap is kept and validation runs purely on strikes.
#[derive(Debug, Clone, Default)]
pub struct ConservativeClassifier;

impl ConservativeClassifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EvidenceClassifier for ConservativeClassifier {
    async fn classify(
        &self,
        _gap: &ResearchGap,
        _papers: &[PaperRecord],
    ) -> Result<Classification, CollaboratorError> {
        Ok(Classification::new(
            Verdict::NotAddressed,
            0.0,
            "no evidence model configured",
        ))
    }

    async fn enrich(
        &self,
        gap: &ResearchGap,
        papers_checked: usize,
    ) -> Result<ValidatedGap, CollaboratorError> {
        Ok(fallback_enrichment(gap, papers_checked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::GapCategory;

    fn gap(description: &str) -> ResearchGap {
        let paper = PaperRecord::new("seed", "Seed Paper");
        ResearchGap::new(description, &paper, GapCategory::Limitation)
    }

    #[test]
    fn test_extract_search_terms() {
        let terms = extract_search_terms(
            "The model often fails on low-light images and cannot handle motion blur",
        );
        assert_eq!(terms, vec!["model", "fails", "low", "light", "images"]);

        assert_eq!(extract_search_terms("a an of"), vec!["research", "method"]);
    }

    #[test]
    fn test_fallback_queries() {
        let g = gap("Shadow removal degrades under strong specular highlights in outdoor scenes");
        let validation = fallback_validation_queries(&g);
        assert_eq!(validation.len(), 3);
        assert!(validation[0].starts_with("solving Shadow removal"));
        assert!(validation[0].chars().count() <= "solving ".len() + 50);

        let related = fallback_related_queries(&g);
        assert_eq!(related, vec!["shadow removal degrades", "shadow removal"]);
    }

    #[test]
    fn test_analyze_text_extracts_statements() {
        let text = "\
A Study of Robust Shadow Removal in the Wild
Abstract. We present a method.

Limitations. Our approach cannot handle scenes with multiple overlapping light sources. \
It also requires paired training data which is expensive to collect at scale.

Conclusion. We introduced a new model. However, inference remains too slow for mobile devices today. \
Future extensions should explore self-supervised training on unpaired photographs.";

        let paper = analyze_text("local:1", text);

        assert_eq!(paper.title, "A Study of Robust Shadow Removal in the Wild");
        assert!(paper
            .limitations
            .iter()
            .any(|l| l.contains("multiple overlapping light sources")));
        assert!(paper
            .limitations
            .iter()
            .any(|l| l.contains("inference remains too slow")));
        assert!(paper
            .future_work
            .iter()
            .any(|f| f.contains("self-supervised training")));
        assert!(paper.limitations.len() <= 4);
    }

    #[test]
    fn test_analyze_text_without_sections() {
        let paper = analyze_text("local:2", "SHORT\nnothing to see");
        assert_eq!(paper.title, "Unknown Title");
        assert!(paper.limitations.is_empty());
        assert!(paper.future_work.is_empty());
    }

    #[test]
    fn test_fallback_enrichment_metrics() {
        let mut g = gap(&"word ".repeat(40));
        g.add_strike();
        let validated = fallback_enrichment(&g, 3);

        assert_eq!(validated.gap_id, g.id);
        assert_eq!(validated.validation_attempts, 1);
        assert_eq!(validated.papers_checked, 3);
        assert_eq!(validated.metrics.difficulty_score, 7.0);
        assert_eq!(validated.metrics.funding_likelihood, 90.0);
        assert_eq!(validated.metrics.time_to_solution, "4-5 years");
        assert_eq!(validated.confidence_score, 75.0);
    }

    #[tokio::test]
    async fn test_conservative_classifier_keeps_gaps() {
        let g = gap("Some sufficiently long limitation statement");
        let paper = PaperRecord::new("p", "P");
        let classification = ConservativeClassifier::new()
            .classify(&g, &[paper])
            .await
            .unwrap();

        assert_eq!(classification.verdict, Verdict::NotAddressed);
        assert!(!classification.eliminates(0.0));
    }
}
