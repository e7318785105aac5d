//! Deep Research Orchestrator
//!
//! Runs the bounded Plan → Search → Evaluate → Refine loop and hands the
//! collected sources to synthesis. All accumulators live inside a single
//! `research` call, so one agent can serve concurrent runs.

use crate::agents::evaluation::EvaluationAgent;
use crate::agents::planning::PlanningAgent;
use crate::agents::refinement::Refiner;
use crate::agents::search::{SearchAgent, SearchOptions};
use crate::agents::synthesis::SynthesisAgent;
use crate::config::Config;
use crate::events::{ResearchPhase, RunContext};
use crate::llm::{LLMProviderConfig, LLM};
use crate::models::{
    Learning, RefinedContent, RefinementReason, ReportMetadata, ResearchEvaluation, ResearchOptions,
    ResearchReport, TerminationReason,
};
use crate::search::{BrowserService, SteelClient};
use crate::types::AppResult;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

pub struct DeepResearchAgent {
    llm: Arc<LLM>,
    browser: Arc<dyn BrowserService>,
    refiner: Refiner,
}

/// What the loop leaves behind for synthesis
struct LoopOutcome {
    content: Vec<RefinedContent>,
    learnings: Vec<Learning>,
    evaluation: Option<ResearchEvaluation>,
    iterations: u32,
    termination: String,
}

impl DeepResearchAgent {
    pub fn new(llm: Arc<LLM>, browser: Arc<dyn BrowserService>) -> Self {
        Self {
            llm,
            browser,
            refiner: Refiner::default(),
        }
    }

    pub fn with_refiner(mut self, refiner: Refiner) -> Self {
        self.refiner = refiner;
        self
    }

    /// Agent backed by the configured LLM provider and Steel
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let llm = LLM::new(LLMProviderConfig::from_config(&config.llm)?);
        let browser = SteelClient::from_config(&config.steel)?;
        Ok(Self::new(Arc::new(llm), Arc::new(browser))
            .with_refiner(Refiner::new(config.research.refiner.clone())))
    }

    pub fn llm(&self) -> &LLM {
        &self.llm
    }

    /// Research `query` and return the cited report.
    ///
    /// Failures are published as an `Error` event before being returned.
    pub async fn research(
        &self,
        ctx: &RunContext,
        query: &str,
        options: &ResearchOptions,
        follow_up: &[String],
    ) -> AppResult<ResearchReport> {
        let result = self.run(ctx, query, options, follow_up).await;
        if let Err(e) = &result {
            error!(session_id = %ctx.session_id(), error = %e, "Research failed");
            ctx.error(e.to_string());
        }
        result
    }

    async fn run(
        &self,
        ctx: &RunContext,
        query: &str,
        options: &ResearchOptions,
        follow_up: &[String],
    ) -> AppResult<ResearchReport> {
        let started = Instant::now();
        options.validate()?;

        info!(
            session_id = %ctx.session_id(),
            query = %query,
            depth = options.depth,
            breadth = options.breadth,
            max_sources = options.max_sources,
            "Starting deep research"
        );

        let outcome = self.research_loop(ctx, query, options, follow_up).await?;

        let sources = Refiner::filter_content(&outcome.content, options.max_sources);
        let synthesis = SynthesisAgent::synthesize(
            ctx,
            &self.llm,
            query,
            &sources,
            &outcome.learnings,
            options.depth,
        )
        .await?;

        let report = ResearchReport {
            id: Uuid::new_v4().to_string(),
            query: query.trim().to_string(),
            executive_summary: synthesis.executive_summary,
            content: synthesis.content,
            citations: synthesis.citations,
            metadata: ReportMetadata {
                iterations: outcome.iterations,
                total_sources: sources.len(),
                total_learnings: outcome.learnings.len(),
                final_coverage: outcome.evaluation.as_ref().map(|e| e.completeness.coverage),
                final_confidence: outcome.evaluation.as_ref().map(|e| e.completeness.confidence),
                termination: outcome.termination,
                model: self.llm.model().to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
                generated_at: Utc::now(),
            },
        };

        info!(
            session_id = %ctx.session_id(),
            report_id = %report.id,
            iterations = report.metadata.iterations,
            sources = report.metadata.total_sources,
            termination = %report.metadata.termination,
            "Research complete"
        );
        ctx.completed(&report.id, report.metadata.total_sources);
        Ok(report)
    }

    async fn research_loop(
        &self,
        ctx: &RunContext,
        query: &str,
        options: &ResearchOptions,
        follow_up: &[String],
    ) -> AppResult<LoopOutcome> {
        let mut plan = PlanningAgent::plan_research(
            ctx,
            &self.llm,
            query,
            options.depth,
            options.breadth,
            follow_up,
        )
        .await?;

        let mut content: Vec<RefinedContent> = Vec::new();
        let mut scraped_urls: HashSet<String> = HashSet::new();
        let mut learnings: Vec<Learning> = Vec::new();
        let mut all_queries: Vec<String> = Vec::new();
        let mut evaluation: Option<ResearchEvaluation> = None;
        let mut current_depth = 0;
        let mut iterations = 0;

        let termination = loop {
            iterations += 1;
            ctx.progress(
                ResearchPhase::Searching,
                format!("Running {} search queries", plan.sub_queries.len()),
                current_depth + 1,
                options.depth,
            );

            for sub_query in &plan.sub_queries {
                all_queries.push(sub_query.query.clone());
                let search_options = SearchOptions {
                    max_results: options.max_results_per_query,
                    timeout: options.timeout(),
                    scraped_urls: &scraped_urls,
                    summary_tokens: options.summary_tokens,
                };
                let result = SearchAgent::search_and_summarize(
                    ctx,
                    &self.llm,
                    self.browser.as_ref(),
                    &sub_query.query,
                    search_options,
                )
                .await;

                match result {
                    Ok(batch) => {
                        for item in batch {
                            if scraped_urls.insert(item.url.clone()) {
                                content.push(item);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            query = %sub_query.query,
                            error = %e,
                            "Search query failed, skipping"
                        );
                    }
                }
            }

            if content.len() >= options.max_sources {
                content.truncate(options.max_sources);
                let reason = TerminationReason::MemoryLimit {
                    sources: content.len(),
                    max_sources: options.max_sources,
                };
                info!(sources = content.len(), "Source limit reached");
                evaluation = Some(ResearchEvaluation::terminal(&reason, Vec::new()));
                break reason.code().to_string();
            }

            if current_depth + 1 >= options.depth {
                let reason = TerminationReason::MaxDepth {
                    completed: current_depth + 1,
                    max_depth: options.depth,
                };
                info!(depth = options.depth, "Depth limit reached");
                evaluation = Some(ResearchEvaluation::terminal(&reason, Vec::new()));
                break reason.code().to_string();
            }

            ctx.progress(
                ResearchPhase::Evaluating,
                format!("Evaluating {} sources", content.len()),
                current_depth + 1,
                options.depth,
            );
            let current = EvaluationAgent::evaluate_findings(
                ctx,
                &self.llm,
                query,
                &content,
                &plan,
                current_depth,
                options.depth,
                options.breadth,
                options.max_sources,
            )
            .await?;
            learnings.extend(current.learnings.iter().cloned());
            let recommends_synthesis = current.recommends_synthesis();
            let current = evaluation.insert(current);

            if recommends_synthesis {
                break RefinementReason::EvaluationRecommendsSynthesis.as_str().to_string();
            }

            ctx.progress(
                ResearchPhase::Refining,
                "Refining search strategy",
                current_depth + 1,
                options.depth,
            );
            let decision = self
                .refiner
                .refine_search_strategy(query, current, &plan, &learnings, &all_queries);
            if !decision.should_continue {
                break decision.reason.as_str().to_string();
            }

            let next_queries: Vec<String> = decision
                .next_queries()
                .into_iter()
                .take(options.breadth as usize)
                .collect();
            if next_queries.is_empty() {
                info!("Every proposed query was already covered");
                let reason = TerminationReason::NoDirections;
                let terminal = ResearchEvaluation::terminal(&reason, current.learnings.clone());
                evaluation = Some(terminal);
                break reason.code().to_string();
            }

            info!(
                guidance = %decision.strategic_guidance,
                queries = next_queries.len(),
                "Starting next research round"
            );
            plan = plan.with_queries(&next_queries);
            current_depth += 1;
        };

        Ok(LoopOutcome {
            content,
            learnings,
            evaluation,
            iterations,
            termination,
        })
    }
}
