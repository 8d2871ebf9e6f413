//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use gapforge::collaborators::{
    fallback_enrichment, Classification, EvidenceClassifier, PaperAnalyzer, SearchProvider,
    Verdict,
};
use gapforge::frontier::{ExplorationPhase, PaperRecord, ProgressReporter, ResearchGap, ValidatedGap};
use gapforge::CollaboratorError;

/// Serves fixed papers; optionally blocks on a semaphore or fails for some references.
#[derive(Default)]
pub struct ScriptedAnalyzer {
    papers: HashMap<String, PaperRecord>,
    failing: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn new(papers: Vec<PaperRecord>) -> Self {
        Self {
            papers: papers.into_iter().map(|p| (p.reference.clone(), p)).collect(),
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, reference: &str) -> Self {
        self.failing.insert(reference.to_string());
        self
    }

    /// Every analysis waits for a permit of `gate` first.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaperAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, reference: &str) -> Result<PaperRecord, CollaboratorError> {
        self.calls.lock().unwrap().push(reference.to_string());

        if let Some(gate) = &self.gate {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let permit = gate.acquire().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            drop(permit);
        }

        if self.failing.contains(reference) {
            return Err(CollaboratorError::Request(format!("cannot fetch {}", reference)));
        }
        if let Some(paper) = self.papers.get(reference) {
            return Ok(paper.clone());
        }
        if let Some(n) = reference.strip_prefix("gen-") {
            // Endless supply of papers, each with two fresh limitations.
            return Ok(PaperRecord::new(reference, format!("Generated paper {}", n))
                .with_limitation(format!("Generated limitation alpha number {}", n))
                .with_limitation(format!("Generated limitation beta number {}", n)));
        }
        Err(CollaboratorError::NotFound(reference.to_string()))
    }
}

/// Returns scripted references keyed by gap description.
///
/// Validation queries look like `solve:<description>`, related queries like
/// `near:<description>`. With `endless` set, every query yields a new
/// `gen-N` reference.
#[derive(Default)]
pub struct ScriptedSearch {
    solving: HashMap<String, Vec<String>>,
    related: HashMap<String, Vec<String>>,
    endless: bool,
    counter: AtomicUsize,
    pub queries: AtomicUsize,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solving(mut self, description: &str, references: &[&str]) -> Self {
        self.solving.insert(
            description.to_string(),
            references.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn related(mut self, description: &str, references: &[&str]) -> Self {
        self.related.insert(
            description.to_string(),
            references.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(
        &self,
        queries: &[String],
        limit_per_query: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        let mut results = Vec::new();
        for query in queries {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.endless {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                results.push(format!("gen-{}", n));
                continue;
            }
            let hits = if let Some(description) = query.strip_prefix("solve:") {
                self.solving.get(description)
            } else if let Some(description) = query.strip_prefix("near:") {
                self.related.get(description)
            } else {
                None
            };
            if let Some(hits) = hits {
                results.extend(hits.iter().take(limit_per_query).cloned());
            }
        }
        Ok(results)
    }

    async fn validation_queries(&self, gap: &ResearchGap) -> Result<Vec<String>, CollaboratorError> {
        Ok(vec![format!("solve:{}", gap.description)])
    }

    async fn related_queries(&self, gap: &ResearchGap) -> Result<Vec<String>, CollaboratorError> {
        Ok(vec![format!("near:{}", gap.description)])
    }
}

/// Classifies by lookup: (gap description, paper reference) pairs that solve,
/// gap descriptions whose classification errors, everything else not addressed.
#[derive(Default)]
pub struct ScriptedClassifier {
    solves: HashMap<(String, String), Classification>,
    failing: HashSet<String>,
    pub classified: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn solved_by(self, description: &str, reference: &str) -> Self {
        self.with_verdict(description, reference, Classification::new(Verdict::Solved, 0.9, "solved"))
    }

    pub fn with_verdict(
        mut self,
        description: &str,
        reference: &str,
        classification: Classification,
    ) -> Self {
        self.solves
            .insert((description.to_string(), reference.to_string()), classification);
        self
    }

    pub fn failing_on(mut self, description: &str) -> Self {
        self.failing.insert(description.to_string());
        self
    }
}

#[async_trait]
impl EvidenceClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        gap: &ResearchGap,
        papers: &[PaperRecord],
    ) -> Result<Classification, CollaboratorError> {
        self.classified.lock().unwrap().push((
            gap.description.clone(),
            papers.iter().map(|p| p.reference.clone()).collect(),
        ));
        if self.failing.contains(&gap.description) {
            return Err(CollaboratorError::Parse("model returned prose".to_string()));
        }
        for paper in papers {
            let key = (gap.description.clone(), paper.reference.clone());
            if let Some(classification) = self.solves.get(&key) {
                return Ok(classification.clone());
            }
        }
        Ok(Classification::not_addressed())
    }

    async fn enrich(
        &self,
        gap: &ResearchGap,
        papers_checked: usize,
    ) -> Result<ValidatedGap, CollaboratorError> {
        Ok(fallback_enrichment(gap, papers_checked))
    }
}

/// Records every progress report.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<(ExplorationPhase, String)>>,
}

#[async_trait]
impl ProgressReporter for RecordingProgress {
    async fn report(&self, phase: ExplorationPhase, message: String) {
        self.events.lock().unwrap().push((phase, message));
    }
}

/// Polls `check` until it returns true or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within 5s"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
