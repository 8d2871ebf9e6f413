//! Evidence classifier backed by an LLM.
//!
//! The model is asked for a strict JSON verdict. Anything that cannot be
//! read as one becomes [`CollaboratorError::Parse`], which the orchestrator
//! treats as "keep the gap".

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CollaboratorError, LlmError};
use crate::frontier::{truncate_chars, PaperRecord, ResearchGap, ValidatedGap};
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::utils::parse_json_response;

use super::heuristics::fallback_enrichment;
use super::{Classification, EvidenceClassifier, Verdict};

const CLASSIFY_SYSTEM_PROMPT: &str = "You are a rigorous research reviewer. \
You decide whether published papers resolve a stated research gap. \
Answer with a single JSON object and nothing else.";

const CLASSIFY_PROMPT: &str = r#"Research gap ({category}): "{gap}"

Candidate papers:
{papers}

Decide whether these papers resolve the gap.
- "solved": a paper directly and convincingly solves the stated problem in the same scope.
- "partially_addressed": a paper makes real progress but leaves part of the problem open.
- "not_addressed": the papers are related at most tangentially.

Respond with JSON:
{"verdict": "solved" | "partially_addressed" | "not_addressed", "confidence": <0.0-1.0>, "rationale": "<one sentence>"}"#;

const ENRICH_SYSTEM_PROMPT: &str = "You are a research strategist describing open research \
opportunities. Answer with a single JSON object and nothing else.";

const ENRICH_PROMPT: &str = r#"This research gap survived {strikes} validation attempt(s) against {papers_checked} paper(s):
"{gap}"
Source paper: {source}

Respond with JSON:
{"title": "<concise title>", "research_area": "<primary research field>", "validation_evidence": "<why the gap is genuine>", "potential_impact": "<impact if solved>", "suggested_approaches": ["<approach>", "..."], "confidence_score": <0-100>}"#;

const PAPER_TEXT_CHARS: usize = 600;

#[derive(Debug, Deserialize)]
struct VerdictPayload {
    verdict: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnrichmentPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    research_area: Option<String>,
    #[serde(default)]
    validation_evidence: Option<String>,
    #[serde(default)]
    potential_impact: Option<String>,
    #[serde(default)]
    suggested_approaches: Vec<String>,
    #[serde(default)]
    confidence_score: Option<f64>,
}

/// Classifier and enricher that delegate judgement to an LLM.
pub struct LlmEvidenceClassifier {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
}

impl LlmEvidenceClassifier {
    /// Creates a classifier; an empty `model` uses the provider's default.
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: 0.1,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    async fn ask(&self, system: &str, prompt: String) -> Result<String, CollaboratorError> {
        let request = GenerationRequest::new(
            self.model.clone(),
            vec![Message::system(system), Message::user(prompt)],
        )
        .with_temperature(self.temperature)
        .with_max_tokens(800);

        let response = self.llm.generate(request).await?;
        response
            .first_content()
            .map(str::to_string)
            .ok_or(CollaboratorError::Llm(LlmError::EmptyResponse))
    }
}

fn describe_papers(papers: &[PaperRecord]) -> String {
    papers
        .iter()
        .enumerate()
        .map(|(i, paper)| {
            let mut entry = format!(
                "{}. {} ({})\n   {}",
                i + 1,
                paper.title,
                paper.reference,
                truncate_chars(&paper.abstract_text, PAPER_TEXT_CHARS)
            );
            if !paper.key_findings.is_empty() {
                entry.push_str(&format!("\n   Findings: {}", paper.key_findings.join("; ")));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl EvidenceClassifier for LlmEvidenceClassifier {
    async fn classify(
        &self,
        gap: &ResearchGap,
        papers: &[PaperRecord],
    ) -> Result<Classification, CollaboratorError> {
        let prompt = CLASSIFY_PROMPT
            .replace("{category}", &gap.category.to_string())
            .replace("{gap}", &gap.description)
            .replace("{papers}", &describe_papers(papers));

        let content = self.ask(CLASSIFY_SYSTEM_PROMPT, prompt).await?;
        let payload: VerdictPayload =
            parse_json_response(&content).map_err(|e| CollaboratorError::Parse(e.to_string()))?;
        let verdict = Verdict::parse(&payload.verdict).ok_or_else(|| {
            CollaboratorError::Parse(format!("unknown verdict '{}'", payload.verdict))
        })?;

        debug!(gap_id = %gap.id, verdict = %verdict, "LLM classification");
        Ok(Classification::new(
            verdict,
            payload.confidence.unwrap_or(0.5),
            payload.rationale.unwrap_or_default(),
        ))
    }

    async fn enrich(
        &self,
        gap: &ResearchGap,
        papers_checked: usize,
    ) -> Result<ValidatedGap, CollaboratorError> {
        let prompt = ENRICH_PROMPT
            .replace("{strikes}", &gap.strikes.to_string())
            .replace("{papers_checked}", &papers_checked.to_string())
            .replace("{gap}", &gap.description)
            .replace("{source}", &gap.source_title);

        let content = self.ask(ENRICH_SYSTEM_PROMPT, prompt).await?;
        let payload: EnrichmentPayload =
            parse_json_response(&content).map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        let mut validated = fallback_enrichment(gap, papers_checked);
        if let Some(title) = payload.title.filter(|t| !t.trim().is_empty()) {
            validated.title = title;
        }
        if let Some(area) = payload.research_area.filter(|a| !a.trim().is_empty()) {
            validated.research_area = area;
        }
        if let Some(evidence) = payload.validation_evidence {
            validated.validation_evidence = evidence;
        }
        if let Some(impact) = payload.potential_impact {
            validated.potential_impact = impact;
        }
        if !payload.suggested_approaches.is_empty() {
            validated.suggested_approaches = payload.suggested_approaches;
        }
        if let Some(score) = payload.confidence_score {
            validated.confidence_score = score.clamp(0.0, 100.0);
        }
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::GapCategory;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use std::sync::Mutex;

    struct ScriptedLlm {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            let prompt = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            self.prompts.lock().unwrap().push(prompt);
            let content = self.replies.lock().unwrap().remove(0)?;
            Ok(GenerationResponse {
                id: "test".to_string(),
                model: request.model,
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: Usage::default(),
            })
        }
    }

    fn gap() -> ResearchGap {
        let paper = PaperRecord::new("seed", "Seed Paper");
        ResearchGap::new(
            "Current detectors fail under heavy fog and low visibility",
            &paper,
            GapCategory::Limitation,
        )
    }

    #[tokio::test]
    async fn test_classify_parses_verdict() {
        let llm = ScriptedLlm::new(vec![Ok(
            "```json\n{\"verdict\": \"Solved\", \"confidence\": 0.93, \"rationale\": \"direct fix\"}\n```"
                .to_string(),
        )]);
        let classifier = LlmEvidenceClassifier::new(llm.clone(), "");
        let paper = PaperRecord::new("p1", "Fog-robust detection").with_abstract("We fix fog.");

        let result = classifier.classify(&gap(), &[paper]).await.unwrap();

        assert_eq!(result.verdict, Verdict::Solved);
        assert!((result.confidence - 0.93).abs() < 1e-9);
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("heavy fog"));
        assert!(prompts[0].contains("Fog-robust detection (p1)"));
    }

    #[tokio::test]
    async fn test_classify_rejects_garbage() {
        let llm = ScriptedLlm::new(vec![
            Ok("I think it is probably solved.".to_string()),
            Ok("{\"verdict\": \"maybe\"}".to_string()),
        ]);
        let classifier = LlmEvidenceClassifier::new(llm, "m");

        assert!(matches!(
            classifier.classify(&gap(), &[]).await,
            Err(CollaboratorError::Parse(_))
        ));
        assert!(matches!(
            classifier.classify(&gap(), &[]).await,
            Err(CollaboratorError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_classify_propagates_llm_errors() {
        let llm = ScriptedLlm::new(vec![Err(LlmError::RateLimited("quota".to_string()))]);
        let classifier = LlmEvidenceClassifier::new(llm, "m");

        assert!(matches!(
            classifier.classify(&gap(), &[]).await,
            Err(CollaboratorError::Llm(LlmError::RateLimited(_)))
        ));
    }

    #[tokio::test]
    async fn test_enrich_overlays_model_fields() {
        let llm = ScriptedLlm::new(vec![Ok(r#"{
            "title": "Fog-robust perception",
            "research_area": "Computer Vision",
            "suggested_approaches": ["synthetic fog augmentation"],
            "confidence_score": 140
        }"#
        .to_string())]);
        let classifier = LlmEvidenceClassifier::new(llm, "m");
        let mut g = gap();
        g.add_strike();

        let validated = classifier.enrich(&g, 4).await.unwrap();

        assert_eq!(validated.title, "Fog-robust perception");
        assert_eq!(validated.research_area, "Computer Vision");
        assert_eq!(validated.suggested_approaches, vec!["synthetic fog augmentation"]);
        assert_eq!(validated.confidence_score, 100.0);
        assert_eq!(validated.papers_checked, 4);
        assert_eq!(validated.validation_attempts, 1);
    }
}
