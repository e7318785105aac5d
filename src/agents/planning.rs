//! Planning Agent
//!
//! Turns the user's question into the first round of search queries. The
//! free-text strategic plan is streamed to the run's event channel as it is
//! generated, then a second structured call extracts at most `breadth`
//! concrete queries from it.

use crate::agents::prompts;
use crate::events::{ResearchPhase, RunContext};
use crate::llm::LLM;
use crate::models::{ResearchPlan, SubQuery};
use crate::types::AppResult;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Validate)]
struct PlanRequest {
    #[validate(length(min = 1, message = "query must not be empty"))]
    query: String,
    #[validate(range(min = 1, max = 10))]
    depth: u32,
    #[validate(range(min = 1, max = 10))]
    breadth: u32,
}

#[derive(Debug, Deserialize)]
struct QueryExtraction {
    #[serde(default)]
    strategy: String,
    #[serde(default)]
    queries: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ClarifyingQuestions {
    #[serde(default)]
    questions: Vec<String>,
}

pub struct PlanningAgent;

impl PlanningAgent {
    /// Build the initial research plan
    pub async fn plan_research(
        ctx: &RunContext,
        llm: &LLM,
        query: &str,
        depth: u32,
        breadth: u32,
        follow_up: &[String],
    ) -> AppResult<ResearchPlan> {
        let query = query.trim();
        PlanRequest {
            query: query.to_string(),
            depth,
            breadth,
        }
        .validate()?;

        info!(session_id = %ctx.session_id(), query = %query, depth, breadth, "Planning research");
        ctx.progress(ResearchPhase::Planning, "Drafting research plan", 0, depth);

        let plan_request = llm.request(
            prompts::PLANNER_SYSTEM,
            prompts::strategic_plan_prompt(query, depth, breadth, follow_up),
        );
        let strategic_plan = llm
            .stream_text(&plan_request, |token| ctx.plan_token(token))
            .await?;

        ctx.progress(ResearchPhase::Planning, "Extracting search queries", 0, depth);
        let extraction_request = llm.request(
            prompts::QUERY_EXTRACTION_SYSTEM,
            prompts::query_extraction_prompt(query, &strategic_plan, breadth),
        );
        let extraction: QueryExtraction = llm.generate_object(&extraction_request).await?;

        let mut queries = Self::clean_queries(extraction.queries, breadth as usize);
        if queries.is_empty() {
            warn!(query = %query, "Planner produced no queries, searching the question itself");
            queries.push(query.to_string());
        }

        let search_strategy = if extraction.strategy.trim().is_empty() {
            "Broad web search across the main aspects of the question".to_string()
        } else {
            extraction.strategy.trim().to_string()
        };

        info!(query_count = queries.len(), "Research plan ready");

        Ok(ResearchPlan {
            id: Uuid::new_v4().to_string(),
            original_query: query.to_string(),
            sub_queries: queries.into_iter().map(SubQuery::new).collect(),
            search_strategy,
            estimated_steps: depth * breadth,
            strategic_plan: Some(strategic_plan),
        })
    }

    /// Follow-up questions to sharpen a vague request before planning
    pub async fn clarifying_questions(
        ctx: &RunContext,
        llm: &LLM,
        query: &str,
        max_questions: usize,
    ) -> AppResult<Vec<String>> {
        let query = query.trim();
        PlanRequest {
            query: query.to_string(),
            depth: 1,
            breadth: 1,
        }
        .validate()?;
        if max_questions == 0 {
            return Ok(Vec::new());
        }

        ctx.progress(ResearchPhase::Planning, "Preparing clarifying questions", 0, 0);
        let request = llm.request(
            prompts::CLARIFICATION_SYSTEM,
            prompts::clarification_prompt(query, max_questions),
        );
        let response: ClarifyingQuestions = llm.generate_object(&request).await?;

        Ok(Self::clean_queries(response.questions, max_questions))
    }

    /// Trimmed, non-empty, case-insensitively unique, capped at `limit`
    fn clean_queries(raw: Vec<String>, limit: usize) -> Vec<String> {
        let mut cleaned: Vec<String> = Vec::new();
        for q in raw {
            let q = q.trim();
            if q.is_empty() || cleaned.iter().any(|c| c.eq_ignore_ascii_case(q)) {
                continue;
            }
            cleaned.push(q.to_string());
            if cleaned.len() >= limit {
                break;
            }
        }
        cleaned
    }
}
