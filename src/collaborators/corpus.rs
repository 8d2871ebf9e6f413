//! A local corpus of pre-analyzed papers acting as analyzer and search provider.
//!
//! The corpus file is a JSON array of [`PaperRecord`]s. Search scores each
//! paper by how many key terms of the query appear in its text.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::CollaboratorError;
use crate::frontier::{truncate_chars, PaperRecord, ResearchGap};

use super::heuristics::{
    analyze_text, extract_search_terms, fallback_related_queries, fallback_validation_queries,
};
use super::{PaperAnalyzer, SearchProvider};

const DEFAULT_MIN_OVERLAP: usize = 2;
const INLINE_TEXT_MIN_CHARS: usize = 200;

/// In-memory paper collection.
#[derive(Debug, Clone, Default)]
pub struct LocalCorpus {
    papers: Vec<PaperRecord>,
    index: HashMap<String, usize>,
    min_overlap: usize,
}

impl LocalCorpus {
    /// Builds a corpus; later duplicates of a reference are ignored.
    pub fn from_papers(papers: Vec<PaperRecord>) -> Self {
        let mut corpus = Self {
            papers: Vec::with_capacity(papers.len()),
            index: HashMap::new(),
            min_overlap: DEFAULT_MIN_OVERLAP,
        };
        for paper in papers {
            if !corpus.index.contains_key(&paper.reference) {
                corpus
                    .index
                    .insert(paper.reference.clone(), corpus.papers.len());
                corpus.papers.push(paper);
            }
        }
        corpus
    }

    /// Loads a JSON array of papers from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CollaboratorError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            CollaboratorError::Unavailable(format!("cannot read corpus {}: {}", path.display(), e))
        })?;
        let papers: Vec<PaperRecord> = serde_json::from_str(&raw)
            .map_err(|e| CollaboratorError::Parse(format!("corpus {}: {}", path.display(), e)))?;

        info!(path = %path.display(), papers = papers.len(), "Loaded paper corpus");
        Ok(Self::from_papers(papers))
    }

    /// Sets how many query terms a paper must contain to be returned.
    pub fn with_min_overlap(mut self, min_overlap: usize) -> Self {
        self.min_overlap = min_overlap.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn get(&self, reference: &str) -> Option<&PaperRecord> {
        self.index.get(reference).map(|&i| &self.papers[i])
    }

    fn search_one(&self, query: &str, limit: usize) -> Vec<String> {
        let terms = extract_search_terms(query);
        let required = self.min_overlap.min(terms.len());

        let mut scored: Vec<(usize, usize)> = self
            .papers
            .iter()
            .enumerate()
            .filter_map(|(position, paper)| {
                let text = paper.searchable_text().to_lowercase();
                let score = terms.iter().filter(|t| text.contains(t.as_str())).count();
                (score >= required && score > 0).then_some((score, position))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, position)| self.papers[position].reference.clone())
            .collect()
    }
}

fn looks_like_inline_text(reference: &str) -> bool {
    let is_url = reference.starts_with("http://") || reference.starts_with("https://");
    !is_url && (reference.contains('\n') || reference.chars().count() >= INLINE_TEXT_MIN_CHARS)
}

#[async_trait]
impl PaperAnalyzer for LocalCorpus {
    async fn analyze(&self, reference: &str) -> Result<PaperRecord, CollaboratorError> {
        if let Some(paper) = self.get(reference) {
            return Ok(paper.clone());
        }

        if looks_like_inline_text(reference) {
            let first_line = reference.lines().next().unwrap_or_default();
            let synthetic = format!("inline:{}", truncate_chars(first_line.trim(), 60));
            debug!(reference = %synthetic, "Analyzing inline paper text");
            return Ok(analyze_text(&synthetic, reference));
        }

        Err(CollaboratorError::NotFound(format!(
            "paper '{}' is not in the corpus",
            truncate_chars(reference, 120)
        )))
    }
}

#[async_trait]
impl SearchProvider for LocalCorpus {
    async fn search(
        &self,
        queries: &[String],
        limit_per_query: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        let mut results = Vec::new();
        for query in queries {
            let hits = self.search_one(query, limit_per_query);
            debug!(query = %query, hits = hits.len(), "Corpus search");
            results.extend(hits);
        }
        Ok(results)
    }

    async fn validation_queries(&self, gap: &ResearchGap) -> Result<Vec<String>, CollaboratorError> {
        Ok(fallback_validation_queries(gap))
    }

    async fn related_queries(&self, gap: &ResearchGap) -> Result<Vec<String>, CollaboratorError> {
        Ok(fallback_related_queries(gap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> LocalCorpus {
        LocalCorpus::from_papers(vec![
            PaperRecord::new("p1", "Shadow removal with diffusion models")
                .with_abstract("We remove shadows using diffusion priors."),
            PaperRecord::new("p2", "Protein folding at scale")
                .with_abstract("Structure prediction for large proteins."),
            PaperRecord::new("p3", "Real-time shadow detection on mobile devices")
                .with_abstract("Shadow detection and removal running on phones."),
            PaperRecord::new("p1", "Duplicate reference"),
        ])
    }

    #[test]
    fn test_duplicates_are_ignored() {
        let corpus = corpus();
        assert_eq!(corpus.len(), 3);
        assert_eq!(
            corpus.get("p1").unwrap().title,
            "Shadow removal with diffusion models"
        );
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let corpus = corpus();
        let hits = corpus
            .search(&["shadow removal mobile".to_string()], 5)
            .await
            .unwrap();

        assert_eq!(hits, vec!["p3", "p1"]);

        let limited = corpus
            .search(&["shadow removal mobile".to_string()], 1)
            .await
            .unwrap();
        assert_eq!(limited, vec!["p3"]);
    }

    #[tokio::test]
    async fn test_search_requires_overlap() {
        let corpus = corpus();
        let hits = corpus
            .search(&["quantum error correction".to_string()], 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_known_and_unknown() {
        let corpus = corpus();
        assert_eq!(corpus.analyze("p2").await.unwrap().title, "Protein folding at scale");

        let missing = corpus.analyze("https://arxiv.org/abs/0000.00000").await;
        assert!(matches!(missing, Err(CollaboratorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_analyze_inline_text() {
        let text = "Graph Neural Networks for Traffic Forecasting\n\
            Limitations. The model cannot capture sudden incidents such as road closures or accidents.";
        let paper = corpus().analyze(text).await.unwrap();

        assert!(paper.reference.starts_with("inline:Graph Neural Networks"));
        assert_eq!(paper.limitations.len(), 1);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.json");
        std::fs::write(
            &path,
            r#"[{"reference": "a", "title": "Alpha", "limitations": ["x"]}]"#,
        )
        .unwrap();

        let corpus = LocalCorpus::load(&path).await.unwrap();
        assert_eq!(corpus.get("a").unwrap().limitations, vec!["x"]);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();
        assert!(matches!(
            LocalCorpus::load(&bad).await,
            Err(CollaboratorError::Parse(_))
        ));
    }
}
