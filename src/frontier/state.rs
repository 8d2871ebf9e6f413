//! Per-job exploration state.
//!
//! A `FrontierState` is created at the start of an orchestrator run and
//! dropped when the report is built. It is owned by exactly one task, so
//! nothing in here is synchronized.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::{EliminatedGap, GapCategory, PaperRecord, ResearchGap, ValidatedGap};

/// Running counters of one exploration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierCounters {
    pub papers_analyzed: usize,
    pub gaps_processed: usize,
    pub gaps_discovered: usize,
    pub gaps_eliminated: usize,
    pub search_queries: usize,
    pub validation_attempts: usize,
    pub frontier_expansions: usize,
    pub failed_analyses: usize,
    pub collaborator_failures: usize,
}

/// Queue, active gap set, seen papers and results of one job.
#[derive(Debug, Default)]
pub struct FrontierState {
    queue: VecDeque<String>,
    active: Vec<ResearchGap>,
    seen: HashSet<String>,
    analyzed: Vec<Arc<PaperRecord>>,
    topics: BTreeSet<String>,
    checks: HashMap<String, usize>,
    validated: Vec<ValidatedGap>,
    eliminated: Vec<EliminatedGap>,
    pub counters: FrontierCounters,
}

impl FrontierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 2 keeps going while there is a queued gap and both budgets remain.
    pub fn can_explore(&self, max_papers: usize) -> bool {
        !self.queue.is_empty()
            && self.counters.papers_analyzed < max_papers
            && self.counters.gaps_processed < max_papers
    }

    pub fn is_seen(&self, reference: &str) -> bool {
        self.seen.contains(reference)
    }

    /// Records an analyzed paper under both the requested and the returned reference.
    pub fn record_paper(&mut self, requested: &str, paper: PaperRecord) -> Arc<PaperRecord> {
        self.seen.insert(requested.to_string());
        self.seen.insert(paper.reference.clone());
        let paper = Arc::new(paper);
        self.analyzed.push(Arc::clone(&paper));
        self.counters.papers_analyzed += 1;
        paper
    }

    /// Marks a reference whose analysis failed so it is not retried.
    pub fn record_failed_analysis(&mut self, reference: &str) {
        self.seen.insert(reference.to_string());
        self.counters.failed_analyses += 1;
    }

    /// Turns the paper's limitation and future-work statements into gaps.
    ///
    /// Statements are trimmed and must be longer than `min_chars`. New gaps
    /// join both the active set and the back of the queue. Returns how many
    /// were added.
    pub fn extract_gaps(&mut self, paper: &PaperRecord, min_chars: usize) -> usize {
        let statements = paper
            .limitations
            .iter()
            .map(|s| (s, GapCategory::Limitation))
            .chain(paper.future_work.iter().map(|s| (s, GapCategory::FutureWork)));

        let mut added = 0;
        for (statement, category) in statements {
            let statement = statement.trim();
            if statement.chars().count() <= min_chars {
                continue;
            }
            let gap = ResearchGap::new(statement, paper, category);
            self.queue.push_back(gap.id.clone());
            self.active.push(gap);
            self.counters.gaps_discovered += 1;
            added += 1;
        }
        added
    }

    /// Pops the earliest queued gap that is still active.
    pub fn pop_next_gap(&mut self) -> Option<ResearchGap> {
        while let Some(id) = self.queue.pop_front() {
            if let Some(gap) = self.active_gap(&id) {
                let gap = gap.clone();
                self.counters.gaps_processed += 1;
                return Some(gap);
            }
        }
        None
    }

    pub fn active_gap(&self, id: &str) -> Option<&ResearchGap> {
        self.active.iter().find(|g| g.id == id)
    }

    /// Active gaps with fewer than `threshold` strikes, in discovery order.
    pub fn gaps_below_threshold(&self, threshold: u32) -> Vec<ResearchGap> {
        self.active
            .iter()
            .filter(|g| g.strikes < threshold)
            .cloned()
            .collect()
    }

    fn take_active(&mut self, id: &str) -> Option<ResearchGap> {
        let position = self.active.iter().position(|g| g.id == id)?;
        Some(self.active.remove(position))
    }

    /// Notes that `papers` papers were checked against a gap.
    pub fn record_check(&mut self, gap_id: &str, papers: usize) {
        *self.checks.entry(gap_id.to_string()).or_default() += papers;
    }

    pub fn papers_checked(&self, gap_id: &str) -> usize {
        self.checks.get(gap_id).copied().unwrap_or(0)
    }

    /// Removes a solved gap from the active set. Returns false if it was
    /// already gone, in which case nothing is recorded.
    pub fn eliminate(&mut self, record: EliminatedGap) -> bool {
        if self.take_active(&record.gap_id).is_none() {
            return false;
        }
        self.counters.gaps_eliminated += 1;
        self.eliminated.push(record);
        true
    }

    /// Adds one strike to an active gap and returns its new count.
    pub fn add_strike(&mut self, gap_id: &str) -> Option<u32> {
        let gap = self.active.iter_mut().find(|g| g.id == gap_id)?;
        gap.add_strike();
        Some(gap.strikes)
    }

    /// Moves a gap from the active set to the validated list.
    pub fn promote(&mut self, validated: ValidatedGap) -> bool {
        if self.take_active(&validated.gap_id).is_none() {
            return false;
        }
        self.validated.push(validated);
        true
    }

    pub fn record_topic(&mut self, topic: impl Into<String>) {
        self.topics.insert(topic.into());
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active_gaps(&self) -> &[ResearchGap] {
        &self.active
    }

    pub fn analyzed_papers(&self) -> &[Arc<PaperRecord>] {
        &self.analyzed
    }

    pub fn topics(&self) -> &BTreeSet<String> {
        &self.topics
    }

    pub fn validated(&self) -> &[ValidatedGap] {
        &self.validated
    }

    pub fn eliminated(&self) -> &[EliminatedGap] {
        &self.eliminated
    }

    /// Consumes the state, returning validated, eliminated and still-pending gaps.
    pub fn into_outcome(self) -> (Vec<ValidatedGap>, Vec<EliminatedGap>, Vec<ResearchGap>) {
        (self.validated, self.eliminated, self.active)
    }
}
