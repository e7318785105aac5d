// Core research models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

/// Knobs for a single research run
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResearchOptions {
    /// Maximum number of search/evaluate iterations
    #[validate(range(min = 1, max = 10))]
    pub depth: u32,
    /// Maximum number of queries issued per iteration
    #[validate(range(min = 1, max = 10))]
    pub breadth: u32,
    /// Hard cap on accumulated sources
    #[validate(range(min = 1))]
    pub max_sources: usize,
    /// Token budget for each page summary
    #[validate(range(min = 1))]
    pub summary_tokens: u32,
    /// Pages scraped per search query
    #[validate(range(min = 1, max = 20))]
    pub max_results_per_query: usize,
    /// Per-request timeout handed to the browser service
    pub timeout_secs: u64,
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            depth: 3,
            breadth: 3,
            max_sources: 60,
            summary_tokens: 500,
            max_results_per_query: 5,
            timeout_secs: 60,
        }
    }
}

impl ResearchOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubQuery {
    pub id: String,
    pub query: String,
}

impl SubQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            query: query.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub id: String,
    pub original_query: String,
    pub sub_queries: Vec<SubQuery>,
    pub search_strategy: String,
    pub estimated_steps: u32,
    pub strategic_plan: Option<String>,
}

impl ResearchPlan {
    /// A new plan for the same query with a different query list
    pub fn with_queries(&self, queries: &[String]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            original_query: self.original_query.clone(),
            sub_queries: queries.iter().map(SubQuery::new).collect(),
            search_strategy: self.search_strategy.clone(),
            estimated_steps: self.estimated_steps,
            strategic_plan: self.strategic_plan.clone(),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.sub_queries.iter().map(|q| q.query.clone()).collect()
    }
}

/// Summary of a single scraped source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefinedContent {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub raw_length: usize,
    pub scraped_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LearningType {
    Factual,
    Analytical,
    Procedural,
    Statistical,
}

impl LearningType {
    /// Lenient parse of model output; unknown labels count as factual
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "analytical" => LearningType::Analytical,
            "procedural" => LearningType::Procedural,
            "statistical" => LearningType::Statistical,
            _ => LearningType::Factual,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningType::Factual => "factual",
            LearningType::Analytical => "analytical",
            LearningType::Procedural => "procedural",
            LearningType::Statistical => "statistical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Learning {
    pub content: String,
    pub learning_type: LearningType,
    pub entities: Vec<String>,
    pub confidence: f64,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecommendedAction {
    Continue,
    Synthesize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletenessAssessment {
    pub coverage: f64,
    pub confidence: f64,
    pub knowledge_gaps: Vec<String>,
    pub has_enough_info: bool,
    pub recommended_action: RecommendedAction,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchDirection {
    pub question: String,
    pub rationale: String,
    pub search_queries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchEvaluation {
    pub learnings: Vec<Learning>,
    pub completeness: CompletenessAssessment,
    pub research_directions: Vec<ResearchDirection>,
}

/// Why a run stopped without asking the evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    MemoryLimit { sources: usize, max_sources: usize },
    MaxDepth { completed: u32, max_depth: u32 },
    NoDirections,
}

impl TerminationReason {
    pub fn code(&self) -> &'static str {
        match self {
            TerminationReason::MemoryLimit { .. } => "memory_limit_reached",
            TerminationReason::MaxDepth { .. } => "max_depth_reached",
            TerminationReason::NoDirections => "no_research_directions_available",
        }
    }

    pub fn reasoning(&self) -> String {
        match self {
            TerminationReason::MemoryLimit { sources, max_sources } => format!(
                "Memory limit reached: {} sources collected (maximum {}). Proceeding to synthesis.",
                sources, max_sources
            ),
            TerminationReason::MaxDepth { completed, max_depth } => format!(
                "Maximum research depth reached ({}/{} iterations). Proceeding to synthesis.",
                completed, max_depth
            ),
            TerminationReason::NoDirections => "No research directions were proposed, so further \
                searching has no target. Proceeding to synthesis."
                .to_string(),
        }
    }
}

impl ResearchEvaluation {
    /// Canned "synthesize" evaluation used whenever the loop stops on a guard
    pub fn terminal(reason: &TerminationReason, learnings: Vec<Learning>) -> Self {
        Self {
            learnings,
            completeness: CompletenessAssessment {
                coverage: 0.8,
                confidence: 0.7,
                knowledge_gaps: Vec::new(),
                has_enough_info: true,
                recommended_action: RecommendedAction::Synthesize,
                reasoning: reason.reasoning(),
            },
            research_directions: Vec::new(),
        }
    }

    /// Conservative "synthesize" evaluation after the evaluator itself failed
    pub fn fallback(error: &str, sources: usize, max_sources: usize) -> Self {
        let coverage = if max_sources == 0 {
            0.0
        } else {
            (sources as f64 / max_sources as f64).min(0.6)
        };
        Self {
            learnings: Vec::new(),
            completeness: CompletenessAssessment {
                coverage,
                confidence: 0.4,
                knowledge_gaps: Vec::new(),
                has_enough_info: false,
                recommended_action: RecommendedAction::Synthesize,
                reasoning: format!(
                    "Evaluation failed ({}); synthesizing from the {} sources gathered so far.",
                    error, sources
                ),
            },
            research_directions: Vec::new(),
        }
    }

    pub fn recommends_synthesis(&self) -> bool {
        self.completeness.recommended_action == RecommendedAction::Synthesize
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefinementReason {
    EvaluationRecommendsSynthesis,
    HighCoverageAchieved,
    NoResearchDirectionsAvailable,
    DiminishingReturnsDetected,
    ContinueResearch,
}

impl RefinementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefinementReason::EvaluationRecommendsSynthesis => "evaluation_recommends_synthesis",
            RefinementReason::HighCoverageAchieved => "high_coverage_achieved",
            RefinementReason::NoResearchDirectionsAvailable => "no_research_directions_available",
            RefinementReason::DiminishingReturnsDetected => "diminishing_returns_detected",
            RefinementReason::ContinueResearch => "continue_research",
        }
    }
}

impl std::fmt::Display for RefinementReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefinementDecision {
    pub should_continue: bool,
    pub reason: RefinementReason,
    pub research_directions: Vec<ResearchDirection>,
    pub strategic_guidance: String,
    pub confidence: f64,
}

impl RefinementDecision {
    /// Flattened query list for the next iteration
    pub fn next_queries(&self) -> Vec<String> {
        self.research_directions
            .iter()
            .flat_map(|d| d.search_queries.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub index: usize,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub iterations: u32,
    pub total_sources: usize,
    pub total_learnings: usize,
    pub final_coverage: Option<f64>,
    pub final_confidence: Option<f64>,
    pub termination: String,
    pub model: String,
    pub duration_ms: u64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    pub id: String,
    pub query: String,
    pub executive_summary: String,
    pub content: String,
    pub citations: Vec<Citation>,
    pub metadata: ReportMetadata,
}
