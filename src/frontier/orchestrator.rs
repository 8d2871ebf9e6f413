//! The four-phase frontier exploration.
//!
//! 1. **Seeding**: analyze the seed paper and turn its limitations and
//!    future-work statements into gaps.
//! 2. **Expansion**: pop gaps in discovery order, look for papers that solve
//!    them or sit next to them, eliminate solved gaps and harvest new gaps
//!    from everything else. Bounded by `max_papers` analyses and gap pops.
//! 3. **Validation**: every surviving gap below the strike threshold gets one
//!    more round of evidence. Gaps that reach the threshold are enriched and
//!    promoted.
//! 4. **Synthesis**: build the [`GapAnalysisReport`].
//!
//! Only a failure to analyze the seed aborts a run. Every other collaborator
//! failure is logged, counted and absorbed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::state::FrontierState;
use super::synthesis::{synthesize, GapAnalysisReport};
use super::types::{truncate_chars, EliminatedGap, ExplorationPhase, PaperRecord, ResearchGap};
use crate::collaborators::heuristics::{fallback_related_queries, fallback_validation_queries};
use crate::collaborators::{
    fallback_enrichment, Classification, EvidenceClassifier, PaperAnalyzer, SearchProvider,
    DEFAULT_PARTIAL_ELIMINATION_CONFIDENCE,
};
use crate::error::CollaboratorError;
use crate::metrics::MetricsCollector;
use crate::scheduler::{AnalysisMode, AnalysisRequest};

/// Default minimum length (exclusive, in characters) of a gap statement.
pub const DEFAULT_MIN_GAP_CHARS: usize = 20;
/// Default number of new papers analyzed per gap in phase 3.
pub const DEFAULT_VALIDATION_PAPERS: usize = 3;
/// Default wall-clock budget for phases 2 and 3 in light mode.
pub const DEFAULT_LIGHT_TIME_BUDGET: Duration = Duration::from_secs(120);

/// Tuning knobs of the frontier algorithm.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Statements with this many characters or fewer are not gaps.
    pub min_gap_chars: usize,
    /// New papers analyzed per gap during final validation.
    pub validation_papers: usize,
    /// Search results requested per query during expansion.
    pub exploration_results_per_query: usize,
    /// Search results requested per query during final validation.
    pub validation_results_per_query: usize,
    /// Confidence at which a partial match counts as a solution.
    pub partial_elimination_confidence: f64,
    /// Time allowed for expansion and validation in light mode.
    pub light_time_budget: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_gap_chars: DEFAULT_MIN_GAP_CHARS,
            validation_papers: DEFAULT_VALIDATION_PAPERS,
            exploration_results_per_query: 1,
            validation_results_per_query: 3,
            partial_elimination_confidence: DEFAULT_PARTIAL_ELIMINATION_CONFIDENCE,
            light_time_budget: DEFAULT_LIGHT_TIME_BUDGET,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_min_gap_chars(mut self, chars: usize) -> Self {
        self.min_gap_chars = chars;
        self
    }

    pub fn with_validation_papers(mut self, papers: usize) -> Self {
        self.validation_papers = papers;
        self
    }

    pub fn with_exploration_results_per_query(mut self, results: usize) -> Self {
        self.exploration_results_per_query = results;
        self
    }

    pub fn with_validation_results_per_query(mut self, results: usize) -> Self {
        self.validation_results_per_query = results;
        self
    }

    pub fn with_partial_elimination_confidence(mut self, confidence: f64) -> Self {
        self.partial_elimination_confidence = confidence;
        self
    }

    pub fn with_light_time_budget(mut self, budget: Duration) -> Self {
        self.light_time_budget = budget;
        self
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The seed paper could not be analyzed, so there is nothing to explore.
    #[error("Failed to analyze seed paper {reference}: {source}")]
    SeedAnalysis {
        reference: String,
        #[source]
        source: CollaboratorError,
    },
}

/// Receives human-readable progress while a run is in flight.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, phase: ExplorationPhase, message: String);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressReporter for NoopProgress {
    async fn report(&self, _phase: ExplorationPhase, _message: String) {}
}

/// Runs the frontier algorithm for one request at a time.
///
/// The orchestrator itself is stateless between runs; every call to
/// [`run`](Self::run) owns a fresh [`FrontierState`], so one instance can be
/// shared by all concurrently executing jobs.
pub struct FrontierOrchestrator {
    analyzer: Arc<dyn PaperAnalyzer>,
    search: Arc<dyn SearchProvider>,
    classifier: Arc<dyn EvidenceClassifier>,
    config: OrchestratorConfig,
    metrics: MetricsCollector,
}

/// Per-run context threaded through the phases.
struct Run<'a> {
    request: &'a AnalysisRequest,
    progress: &'a dyn ProgressReporter,
    deadline: Option<Instant>,
    state: FrontierState,
}

impl Run<'_> {
    fn out_of_time(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn max_papers(&self) -> usize {
        self.request.max_papers as usize
    }
}

impl FrontierOrchestrator {
    pub fn new(
        analyzer: Arc<dyn PaperAnalyzer>,
        search: Arc<dyn SearchProvider>,
        classifier: Arc<dyn EvidenceClassifier>,
    ) -> Self {
        Self {
            analyzer,
            search,
            classifier,
            config: OrchestratorConfig::default(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Explores the research frontier around `request.seed_reference`.
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<GapAnalysisReport, OrchestratorError> {
        let started = Instant::now();
        let deadline = match request.analysis_mode {
            AnalysisMode::Light => Some(started + self.config.light_time_budget),
            AnalysisMode::Deep => None,
        };
        let mut run = Run {
            request,
            progress,
            deadline,
            state: FrontierState::new(),
        };

        let seed = self.seed(&mut run).await?;
        self.expand(&mut run).await;
        self.validate(&mut run).await;

        let pending = run.state.active_gaps().len();
        progress
            .report(
                ExplorationPhase::Synthesis,
                format!(
                    "Phase 4: Synthesizing {} validated gaps ({} eliminated, {} pending)...",
                    run.state.validated().len(),
                    run.state.eliminated().len(),
                    pending
                ),
            )
            .await;

        let report = synthesize(request, &seed, run.state, started.elapsed());
        info!(
            seed = %truncate_chars(&request.seed_reference, 80),
            validated = report.validated_gaps.len(),
            eliminated = report.eliminated_gaps.len(),
            papers = report.process_metadata.total_papers_analyzed,
            "Frontier exploration finished"
        );
        Ok(report)
    }

    async fn seed(&self, run: &mut Run<'_>) -> Result<Arc<PaperRecord>, OrchestratorError> {
        let reference = run.request.seed_reference.as_str();
        run.progress
            .report(
                ExplorationPhase::Seeding,
                "Phase 1: Analyzing seed paper and extracting initial gaps...".to_string(),
            )
            .await;

        let paper = match self.analyzer.analyze(reference).await {
            Ok(paper) => paper,
            Err(source) => {
                self.metrics.record_collaborator_failure("analyzer");
                return Err(OrchestratorError::SeedAnalysis {
                    reference: truncate_chars(reference, 120),
                    source,
                });
            }
        };

        let seed = run.state.record_paper(reference, paper);
        let gaps = run.state.extract_gaps(&seed, self.config.min_gap_chars);
        info!(title = %seed.title, gaps, "Seed paper analyzed");
        self.metrics.record_gaps("discovered", gaps);
        Ok(seed)
    }

    async fn expand(&self, run: &mut Run<'_>) {
        let max_papers = run.max_papers();
        while run.state.can_explore(max_papers) {
            if run.out_of_time() {
                info!("Light mode time budget spent during expansion");
                break;
            }
            let Some(gap) = run.state.pop_next_gap() else {
                break;
            };

            run.progress
                .report(
                    ExplorationPhase::Expansion,
                    format!(
                        "Phase 2: Exploring gap {}/{}: {}...",
                        run.state.counters.gaps_processed,
                        max_papers,
                        gap.short_description()
                    ),
                )
                .await;
            debug!(gap_id = %gap.id, queued = run.state.queue_len(), "Exploring gap");

            let candidates = self.expansion_candidates(run, &gap).await;
            for reference in candidates {
                if run.state.counters.papers_analyzed >= max_papers {
                    break;
                }
                if run.state.is_seen(&reference) {
                    continue;
                }
                let Some(paper) = self.analyze_candidate(run, &reference).await else {
                    continue;
                };
                run.state.record_check(&gap.id, 1);

                let papers = [paper.as_ref().clone()];
                if let Some(classification) = self.classify(run, &gap, &papers).await {
                    if classification.eliminates(self.config.partial_elimination_confidence) {
                        self.eliminate(run, &gap, &papers, classification, ExplorationPhase::Expansion);
                        break;
                    }
                }

                let added = run.state.extract_gaps(&paper, self.config.min_gap_chars);
                if added > 0 {
                    run.state.counters.frontier_expansions += 1;
                    self.metrics.record_gaps("discovered", added);
                    debug!(reference = %paper.reference, added, "Frontier expanded");
                }
            }

            run.state.record_topic(gap.short_description());
        }
    }

    /// Elimination candidates followed by related-research candidates, deduplicated.
    async fn expansion_candidates(&self, run: &mut Run<'_>, gap: &ResearchGap) -> Vec<String> {
        let limit = self.config.exploration_results_per_query;

        let elimination_queries = match self.search.validation_queries(gap).await {
            Ok(queries) => queries,
            Err(e) => {
                warn!(gap_id = %gap.id, error = %e, "Validation query generation failed, using fallback");
                self.collaborator_failed(run, "search");
                fallback_validation_queries(gap)
            }
        };
        let related_queries = match self.search.related_queries(gap).await {
            Ok(queries) => queries,
            Err(e) => {
                warn!(gap_id = %gap.id, error = %e, "Related query generation failed, using fallback");
                self.collaborator_failed(run, "search");
                fallback_related_queries(gap)
            }
        };

        let mut candidates = self.search_references(run, gap, &elimination_queries, limit).await;
        candidates.extend(self.search_references(run, gap, &related_queries, limit).await);

        let mut unique = Vec::with_capacity(candidates.len());
        for reference in candidates {
            if !unique.contains(&reference) {
                unique.push(reference);
            }
        }
        unique
    }

    async fn search_references(
        &self,
        run: &mut Run<'_>,
        gap: &ResearchGap,
        queries: &[String],
        limit: usize,
    ) -> Vec<String> {
        if queries.is_empty() {
            return Vec::new();
        }
        run.state.counters.search_queries += queries.len();
        match self.search.search(queries, limit).await {
            Ok(references) => references,
            Err(e) => {
                warn!(gap_id = %gap.id, error = %e, "Search failed");
                self.collaborator_failed(run, "search");
                Vec::new()
            }
        }
    }

    async fn analyze_candidate(
        &self,
        run: &mut Run<'_>,
        reference: &str,
    ) -> Option<Arc<PaperRecord>> {
        match self.analyzer.analyze(reference).await {
            Ok(paper) => {
                debug!(reference, title = %paper.title, "Candidate analyzed");
                Some(run.state.record_paper(reference, paper))
            }
            Err(e) => {
                warn!(reference, error = %e, "Paper analysis failed, skipping");
                run.state.record_failed_analysis(reference);
                self.metrics.record_collaborator_failure("analyzer");
                None
            }
        }
    }

    /// Returns `None` when the classifier failed; the gap is then kept.
    async fn classify(
        &self,
        run: &mut Run<'_>,
        gap: &ResearchGap,
        papers: &[PaperRecord],
    ) -> Option<Classification> {
        match self.classifier.classify(gap, papers).await {
            Ok(classification) => Some(classification),
            Err(e) => {
                warn!(gap_id = %gap.id, error = %e, "Classification failed, keeping gap");
                self.collaborator_failed(run, "classifier");
                None
            }
        }
    }

    fn eliminate(
        &self,
        run: &mut Run<'_>,
        gap: &ResearchGap,
        papers: &[PaperRecord],
        classification: Classification,
        phase: ExplorationPhase,
    ) {
        let record = EliminatedGap {
            gap_id: gap.id.clone(),
            description: gap.description.clone(),
            category: gap.category,
            evidence_references: papers.iter().map(|p| p.reference.clone()).collect(),
            verdict: classification.verdict,
            confidence: classification.confidence,
            rationale: classification.rationale,
            during_phase: phase,
        };
        if run.state.eliminate(record) {
            info!(
                gap_id = %gap.id,
                verdict = %classification.verdict,
                phase = %phase,
                "Gap eliminated"
            );
            self.metrics.record_gaps("eliminated", 1);
        }
    }

    async fn validate(&self, run: &mut Run<'_>) {
        let threshold = run.request.validation_threshold;
        let candidates = run.state.gaps_below_threshold(threshold);
        run.progress
            .report(
                ExplorationPhase::Validation,
                format!("Phase 3: Validating {} remaining gaps...", candidates.len()),
            )
            .await;

        for gap in candidates {
            if run.out_of_time() {
                info!("Light mode time budget spent during validation");
                break;
            }

            let queries = match self.search.validation_queries(&gap).await {
                Ok(queries) => queries,
                Err(e) => {
                    warn!(gap_id = %gap.id, error = %e, "Validation query generation failed, using fallback");
                    self.collaborator_failed(run, "search");
                    fallback_validation_queries(&gap)
                }
            };
            let references = self
                .search_references(run, &gap, &queries, self.config.validation_results_per_query)
                .await;

            let mut papers = Vec::new();
            for reference in references {
                if papers.len() >= self.config.validation_papers {
                    break;
                }
                if run.state.is_seen(&reference) {
                    continue;
                }
                if let Some(paper) = self.analyze_candidate(run, &reference).await {
                    papers.push(paper.as_ref().clone());
                }
            }
            run.state.record_check(&gap.id, papers.len());

            if !papers.is_empty() {
                if let Some(classification) = self.classify(run, &gap, &papers).await {
                    if classification.eliminates(self.config.partial_elimination_confidence) {
                        self.eliminate(run, &gap, &papers, classification, ExplorationPhase::Validation);
                        continue;
                    }
                }
            }

            let Some(strikes) = run.state.add_strike(&gap.id) else {
                continue;
            };
            run.state.counters.validation_attempts += 1;
            debug!(gap_id = %gap.id, strikes, threshold, "Gap survived validation round");

            if strikes >= threshold {
                self.promote(run, &gap.id).await;
            }
        }
    }

    async fn promote(&self, run: &mut Run<'_>, gap_id: &str) {
        let Some(gap) = run.state.active_gap(gap_id).cloned() else {
            return;
        };
        let papers_checked = run.state.papers_checked(gap_id);
        let validated = match self.classifier.enrich(&gap, papers_checked).await {
            Ok(validated) => validated,
            Err(e) => {
                warn!(gap_id = %gap.id, error = %e, "Enrichment failed, using heuristic enrichment");
                self.collaborator_failed(run, "classifier");
                fallback_enrichment(&gap, papers_checked)
            }
        };
        if run.state.promote(validated) {
            info!(gap_id = %gap.id, strikes = gap.strikes, "Gap validated");
            self.metrics.record_gaps("validated", 1);
        }
    }

    fn collaborator_failed(&self, run: &mut Run<'_>, collaborator: &str) {
        run.state.counters.collaborator_failures += 1;
        self.metrics.record_collaborator_failure(collaborator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{ConservativeClassifier, LocalCorpus, Verdict};
    use crate::frontier::ValidatedGap;
    use std::sync::Mutex;

    fn seed_paper() -> PaperRecord {
        PaperRecord::new("seed", "Seed Paper")
            .with_limitation("The method requires large labelled training sets")
            .with_limitation("Evaluation only covers English benchmark data")
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl PaperAnalyzer for FailingAnalyzer {
        async fn analyze(&self, reference: &str) -> Result<PaperRecord, CollaboratorError> {
            Err(CollaboratorError::NotFound(reference.to_string()))
        }
    }

    /// Returns the same classification for every gap and records enrich calls.
    struct FixedClassifier {
        classification: Classification,
        enriched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EvidenceClassifier for FixedClassifier {
        async fn classify(
            &self,
            _gap: &ResearchGap,
            _papers: &[PaperRecord],
        ) -> Result<Classification, CollaboratorError> {
            Ok(self.classification.clone())
        }

        async fn enrich(
            &self,
            gap: &ResearchGap,
            papers_checked: usize,
        ) -> Result<ValidatedGap, CollaboratorError> {
            self.enriched.lock().unwrap().push(gap.id.clone());
            Ok(fallback_enrichment(gap, papers_checked))
        }
    }

    fn orchestrator(
        corpus: LocalCorpus,
        classifier: Arc<dyn EvidenceClassifier>,
    ) -> FrontierOrchestrator {
        let corpus = Arc::new(corpus);
        FrontierOrchestrator::new(corpus.clone(), corpus, classifier)
    }

    #[tokio::test]
    async fn test_seed_failure_is_fatal() {
        let corpus = Arc::new(LocalCorpus::from_papers(vec![]));
        let orchestrator = FrontierOrchestrator::new(
            Arc::new(FailingAnalyzer),
            corpus,
            Arc::new(ConservativeClassifier::new()),
        );
        let request = AnalysisRequest::new("https://example.org/missing");

        let err = orchestrator.run(&request, &NoopProgress).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::SeedAnalysis { .. }));
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_seed_without_gaps_is_empty_success() {
        let corpus = LocalCorpus::from_papers(vec![PaperRecord::new("seed", "Nothing to see")]);
        let orchestrator = orchestrator(corpus, Arc::new(ConservativeClassifier::new()));

        let report = orchestrator
            .run(&AnalysisRequest::new("seed"), &NoopProgress)
            .await
            .unwrap();

        assert!(report.validated_gaps.is_empty());
        assert_eq!(report.process_metadata.gaps_discovered, 0);
        assert_eq!(report.process_metadata.total_papers_analyzed, 1);
    }

    #[tokio::test]
    async fn test_conservative_run_promotes_seed_gaps() {
        let corpus = LocalCorpus::from_papers(vec![seed_paper()]);
        let orchestrator = orchestrator(corpus, Arc::new(ConservativeClassifier::new()));
        let request = AnalysisRequest::new("seed")
            .with_max_papers(5)
            .with_validation_threshold(1)
            .with_analysis_mode(AnalysisMode::Light);

        let report = orchestrator.run(&request, &NoopProgress).await.unwrap();

        assert_eq!(report.validated_gaps.len(), 2);
        assert_eq!(report.process_metadata.gaps_eliminated, 0);
        assert_eq!(report.process_metadata.gaps_discovered, 2);
    }

    #[tokio::test]
    async fn test_solved_verdict_eliminates_during_expansion() {
        let solver = PaperRecord::new("solver", "Learning from few labelled training examples")
            .with_abstract("We remove the need for large labelled training sets via self supervision");
        let corpus = LocalCorpus::from_papers(vec![seed_paper(), solver]).with_min_overlap(1);
        let classifier = Arc::new(FixedClassifier {
            classification: Classification::new(Verdict::Solved, 0.95, "direct solution"),
            enriched: Mutex::new(Vec::new()),
        });
        let config = OrchestratorConfig::default().with_exploration_results_per_query(3);
        let orchestrator = orchestrator(corpus, classifier).with_config(config);

        let report = orchestrator
            .run(&AnalysisRequest::new("seed"), &NoopProgress)
            .await
            .unwrap();

        assert!(report.process_metadata.gaps_eliminated >= 1);
        let eliminated = &report.eliminated_gaps[0];
        assert_eq!(eliminated.evidence_references, vec!["solver".to_string()]);
        assert_eq!(eliminated.during_phase, ExplorationPhase::Expansion);
        for validated in &report.validated_gaps {
            assert!(report
                .eliminated_gaps
                .iter()
                .all(|e| e.gap_id != validated.gap_id));
        }
    }

    #[tokio::test]
    async fn test_weak_partial_match_does_not_eliminate() {
        let related = PaperRecord::new("related", "Labelled training sets at scale");
        let corpus = LocalCorpus::from_papers(vec![seed_paper(), related]).with_min_overlap(1);
        let classifier = Arc::new(FixedClassifier {
            classification: Classification::new(Verdict::PartiallyAddressed, 0.5, "partial"),
            enriched: Mutex::new(Vec::new()),
        });
        let orchestrator = orchestrator(corpus, classifier.clone());
        let request = AnalysisRequest::new("seed").with_validation_threshold(1);

        let report = orchestrator.run(&request, &NoopProgress).await.unwrap();

        assert_eq!(report.process_metadata.gaps_eliminated, 0);
        assert_eq!(report.validated_gaps.len(), 2);
        assert_eq!(classifier.enriched.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_light_mode_budget_skips_validation() {
        let corpus = LocalCorpus::from_papers(vec![seed_paper()]);
        let config = OrchestratorConfig::default().with_light_time_budget(Duration::ZERO);
        let orchestrator =
            orchestrator(corpus, Arc::new(ConservativeClassifier::new())).with_config(config);
        let request = AnalysisRequest::new("seed")
            .with_validation_threshold(1)
            .with_analysis_mode(AnalysisMode::Light);

        let report = orchestrator.run(&request, &NoopProgress).await.unwrap();

        assert!(report.validated_gaps.is_empty());
        assert_eq!(report.process_metadata.gaps_pending, 2);
    }
}
