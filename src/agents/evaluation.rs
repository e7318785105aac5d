//! Evaluation Agent
//!
//! Reads everything gathered so far and decides what was learned, how
//! complete the answer is, and where to look next. Guard conditions are
//! checked before the model is consulted; a model failure never aborts the
//! run, it turns into a conservative "synthesize" evaluation.

use crate::agents::prompts;
use crate::events::RunContext;
use crate::llm::LLM;
use crate::models::{
    CompletenessAssessment, Learning, LearningType, RecommendedAction, RefinedContent,
    ResearchDirection, ResearchEvaluation, ResearchPlan, TerminationReason,
};
use crate::types::{AppError, AppResult};
use crate::utils::truncate_chars;
use serde::Deserialize;
use tracing::{info, warn};

/// Per-source summary length sent to the evaluator
const MAX_SUMMARY_CHARS: usize = 25_000;
/// Learnings synthesized from summaries when the depth limit is hit
const MAX_QUICK_LEARNINGS: usize = 10;
const QUICK_LEARNING_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluationWire {
    #[serde(default)]
    learnings: Vec<LearningWire>,
    completeness_assessment: CompletenessWire,
    #[serde(default)]
    research_directions: Vec<DirectionWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LearningWire {
    content: String,
    #[serde(rename = "type", default)]
    learning_type: String,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default = "default_learning_confidence")]
    confidence: f64,
    #[serde(default)]
    source_url: Option<String>,
}

fn default_learning_confidence() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletenessWire {
    coverage: f64,
    confidence: f64,
    #[serde(default)]
    knowledge_gaps: Vec<String>,
    #[serde(default)]
    has_enough_info: bool,
    recommended_action: String,
    #[serde(default)]
    reasoning: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectionWire {
    question: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    search_queries: Vec<String>,
}

impl EvaluationWire {
    fn into_evaluation(self, breadth: usize) -> ResearchEvaluation {
        let learnings = self
            .learnings
            .into_iter()
            .filter(|l| !l.content.trim().is_empty())
            .map(|l| Learning {
                content: l.content.trim().to_string(),
                learning_type: LearningType::parse(&l.learning_type),
                entities: l.entities,
                confidence: l.confidence.clamp(0.0, 1.0),
                source_url: l.source_url.filter(|u| !u.is_empty()),
            })
            .collect();

        let recommended_action = if self
            .completeness_assessment
            .recommended_action
            .to_lowercase()
            .contains("synth")
        {
            RecommendedAction::Synthesize
        } else {
            RecommendedAction::Continue
        };

        let research_directions = self
            .research_directions
            .into_iter()
            .map(|d| ResearchDirection {
                question: d.question,
                rationale: d.rationale,
                search_queries: d
                    .search_queries
                    .into_iter()
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .take(breadth)
                    .collect(),
            })
            .collect();

        let c = self.completeness_assessment;
        ResearchEvaluation {
            learnings,
            completeness: CompletenessAssessment {
                coverage: c.coverage,
                confidence: c.confidence,
                knowledge_gaps: c.knowledge_gaps,
                has_enough_info: c.has_enough_info,
                recommended_action,
                reasoning: c.reasoning.trim().to_string(),
            },
            research_directions,
        }
    }
}

pub struct EvaluationAgent;

impl EvaluationAgent {
    #[allow(clippy::too_many_arguments)]
    pub async fn evaluate_findings(
        ctx: &RunContext,
        llm: &LLM,
        query: &str,
        content: &[RefinedContent],
        plan: &ResearchPlan,
        current_depth: u32,
        max_depth: u32,
        breadth: u32,
        max_sources: usize,
    ) -> AppResult<ResearchEvaluation> {
        if content.len() > max_sources {
            info!(
                sources = content.len(),
                max_sources,
                "Memory limit reached, skipping evaluation"
            );
            let reason = TerminationReason::MemoryLimit {
                sources: content.len(),
                max_sources,
            };
            return Ok(ResearchEvaluation::terminal(&reason, Vec::new()));
        }

        if current_depth >= max_depth {
            info!(current_depth, max_depth, "Maximum depth reached, skipping evaluation");
            let reason = TerminationReason::MaxDepth {
                completed: current_depth,
                max_depth,
            };
            return Ok(ResearchEvaluation::terminal(&reason, Self::quick_learnings(content)));
        }

        if content.is_empty() {
            return Err(AppError::InvalidRequest(
                "no content available to evaluate".to_string(),
            ));
        }

        let sources: Vec<(String, String, String)> = content
            .iter()
            .map(|c| {
                (
                    c.title.clone(),
                    c.url.clone(),
                    truncate_chars(&c.summary, MAX_SUMMARY_CHARS).to_string(),
                )
            })
            .collect();

        let request = llm.request(
            prompts::EVALUATOR_SYSTEM,
            prompts::evaluation_prompt(query, plan, &sources, current_depth, max_depth, breadth),
        );

        let evaluation = llm
            .generate_object::<EvaluationWire>(&request)
            .await
            .map(|wire| wire.into_evaluation(breadth as usize))
            .and_then(Self::validate_evaluation);

        match evaluation {
            Ok(evaluation) => {
                info!(
                    session_id = %ctx.session_id(),
                    learnings = evaluation.learnings.len(),
                    coverage = evaluation.completeness.coverage,
                    directions = evaluation.research_directions.len(),
                    action = ?evaluation.completeness.recommended_action,
                    "Evaluation complete"
                );
                Ok(evaluation)
            }
            Err(e) => {
                warn!(error = %e, "Evaluation failed, falling back to synthesis");
                Ok(ResearchEvaluation::fallback(&e.to_string(), content.len(), max_sources))
            }
        }
    }

    /// Consistency checks on a parsed evaluation
    pub fn validate_evaluation(
        mut evaluation: ResearchEvaluation,
    ) -> AppResult<ResearchEvaluation> {
        let c = &mut evaluation.completeness;
        if !(0.0..=1.0).contains(&c.coverage) {
            return Err(AppError::Parse(format!("coverage {} is outside [0, 1]", c.coverage)));
        }
        if !(0.0..=1.0).contains(&c.confidence) {
            return Err(AppError::Parse(format!("confidence {} is outside [0, 1]", c.confidence)));
        }

        if c.recommended_action == RecommendedAction::Continue
            && evaluation.research_directions.is_empty()
        {
            warn!(
                "Evaluation asked to continue without research directions, switching to synthesis"
            );
            c.recommended_action = RecommendedAction::Synthesize;
            let note = "No research directions were provided, so synthesis is recommended instead.";
            c.reasoning = if c.reasoning.is_empty() {
                note.to_string()
            } else {
                format!("{} {}", c.reasoning, note)
            };
        }

        if c.recommended_action == RecommendedAction::Synthesize && c.reasoning.trim().is_empty() {
            return Err(AppError::Parse("synthesis recommended without reasoning".to_string()));
        }

        Ok(evaluation)
    }

    fn quick_learnings(content: &[RefinedContent]) -> Vec<Learning> {
        content
            .iter()
            .filter(|c| !c.summary.trim().is_empty())
            .take(MAX_QUICK_LEARNINGS)
            .map(|c| Learning {
                content: truncate_chars(c.summary.trim(), QUICK_LEARNING_CHARS).to_string(),
                learning_type: LearningType::Factual,
                entities: Vec::new(),
                confidence: 0.5,
                source_url: Some(c.url.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubQuery;
    use crate::test_support::ScriptedLLM;
    use chrono::Utc;

    fn plan() -> ResearchPlan {
        ResearchPlan {
            id: "plan".to_string(),
            original_query: "capital of France".to_string(),
            sub_queries: vec![SubQuery::new("capital of France")],
            search_strategy: "encyclopedias".to_string(),
            estimated_steps: 3,
            strategic_plan: None,
        }
    }

    fn content(n: usize) -> Vec<RefinedContent> {
        (0..n)
            .map(|i| RefinedContent {
                title: format!("Source {}", i),
                url: format!("https://example.com/{}", i),
                summary: format!("Summary number {}", i),
                raw_length: 100,
                scraped_at: Utc::now(),
            })
            .collect()
    }

    async fn evaluate(
        llm: &LLM,
        content: &[RefinedContent],
        depth: u32,
        max_sources: usize,
    ) -> AppResult<ResearchEvaluation> {
        EvaluationAgent::evaluate_findings(
            &RunContext::new(),
            llm,
            "capital of France",
            content,
            &plan(),
            depth,
            3,
            2,
            max_sources,
        )
        .await
    }

    const CONTINUE_RESPONSE: &str = r#"{
        "learnings": [
            {
                "content": "Paris is the capital of France",
                "type": "factual",
                "entities": ["Paris", "France"],
                "confidence": 0.95,
                "sourceUrl": "https://example.com/0"
            }
        ],
        "completenessAssessment": {
            "coverage": 0.5, "confidence": 0.6, "knowledgeGaps": ["history"],
            "hasEnoughInfo": false,
            "recommendedAction": "continue",
            "reasoning": "History is missing"
        },
        "researchDirections": [
            {
                "question": "When did Paris become the capital?",
                "rationale": "history",
                "searchQueries": ["Paris capital history", "Clovis Paris", "Capetian Paris"]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_memory_limit_skips_llm() {
        let scripted = ScriptedLLM::new(|_| CONTINUE_RESPONSE.to_string());
        let llm = scripted.llm();

        let evaluation = evaluate(&llm, &content(61), 0, 60).await.unwrap();

        assert!(evaluation.recommends_synthesis());
        assert_eq!(evaluation.completeness.coverage, 0.8);
        assert_eq!(evaluation.completeness.confidence, 0.7);
        assert!(evaluation.completeness.knowledge_gaps.is_empty());
        assert!(evaluation.completeness.reasoning.contains("Memory limit"));
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn test_max_depth_skips_llm_with_quick_learnings() {
        let scripted = ScriptedLLM::new(|_| CONTINUE_RESPONSE.to_string());
        let llm = scripted.llm();

        let evaluation = evaluate(&llm, &content(12), 3, 60).await.unwrap();

        assert!(evaluation.recommends_synthesis());
        assert!(evaluation.completeness.reasoning.contains("Maximum"));
        assert_eq!(evaluation.learnings.len(), 10);
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let scripted = ScriptedLLM::new(|_| CONTINUE_RESPONSE.to_string());
        let llm = scripted.llm();
        let result = evaluate(&llm, &[], 0, 60).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_parses_and_caps_directions() {
        let scripted = ScriptedLLM::new(|_| CONTINUE_RESPONSE.to_string());
        let llm = scripted.llm();

        let evaluation = evaluate(&llm, &content(2), 0, 60).await.unwrap();

        assert_eq!(evaluation.completeness.recommended_action, RecommendedAction::Continue);
        assert_eq!(evaluation.learnings[0].learning_type, LearningType::Factual);
        assert_eq!(evaluation.learnings[0].source_url.as_deref(), Some("https://example.com/0"));
        assert_eq!(evaluation.research_directions[0].search_queries.len(), 2);

        let calls = scripted.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].json_output);
        assert!(calls[0].prompt_text().contains("Summary number 1"));
    }

    #[tokio::test]
    async fn test_long_summaries_are_truncated() {
        let scripted = ScriptedLLM::new(|_| CONTINUE_RESPONSE.to_string());
        let llm = scripted.llm();
        let mut items = content(1);
        items[0].summary = "x".repeat(30_000);

        evaluate(&llm, &items, 0, 60).await.unwrap();

        let prompt = scripted.calls()[0].prompt_text();
        assert!(prompt.contains(&"x".repeat(25_000)));
        assert!(!prompt.contains(&"x".repeat(25_001)));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let scripted = ScriptedLLM::failing("upstream timeout");
        let llm = scripted.llm();

        let evaluation = evaluate(&llm, &content(10), 0, 60).await.unwrap();

        assert!(evaluation.recommends_synthesis());
        assert!(evaluation.completeness.coverage <= 0.6);
        assert!(evaluation.completeness.reasoning.contains("upstream timeout"));
    }

    #[tokio::test]
    async fn test_out_of_range_coverage_falls_back() {
        let scripted = ScriptedLLM::new(|_| {
            CONTINUE_RESPONSE.replace("\"coverage\": 0.5", "\"coverage\": 1.5")
        });
        let llm = scripted.llm();

        let evaluation = evaluate(&llm, &content(2), 0, 60).await.unwrap();

        assert!(evaluation.recommends_synthesis());
        assert!(evaluation.completeness.reasoning.contains("coverage"));
    }

    fn evaluation(
        action: RecommendedAction,
        reasoning: &str,
        directions: Vec<ResearchDirection>,
    ) -> ResearchEvaluation {
        ResearchEvaluation {
            learnings: Vec::new(),
            completeness: CompletenessAssessment {
                coverage: 0.4,
                confidence: 0.5,
                knowledge_gaps: Vec::new(),
                has_enough_info: false,
                recommended_action: action,
                reasoning: reasoning.to_string(),
            },
            research_directions: directions,
        }
    }

    #[test]
    fn test_continue_without_directions_downgrades() {
        let validated = EvaluationAgent::validate_evaluation(evaluation(
            RecommendedAction::Continue,
            "Need more",
            Vec::new(),
        ))
        .unwrap();
        assert_eq!(validated.completeness.recommended_action, RecommendedAction::Synthesize);
        assert!(validated.completeness.reasoning.starts_with("Need more"));
        assert!(validated.completeness.reasoning.contains("No research directions"));
    }

    #[test]
    fn test_synthesize_requires_reasoning() {
        let result = EvaluationAgent::validate_evaluation(evaluation(
            RecommendedAction::Synthesize,
            "  ",
            Vec::new(),
        ));
        assert!(matches!(result, Err(AppError::Parse(_))));
    }
}
