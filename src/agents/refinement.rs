//! Refinement
//!
//! Deterministic decisions between evaluation rounds: stop or continue, and
//! which of the evaluator's proposed queries are actually new. No model
//! calls happen here.

use crate::config::RefinerConfig;
use crate::models::{
    Learning, LearningType, RefinedContent, RefinementDecision, RefinementReason,
    ResearchDirection, ResearchEvaluation, ResearchPlan,
};
use crate::utils::token_overlap_ratio;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

const HIGH_COVERAGE: f64 = 0.8;
const DIMINISHING_COVERAGE: f64 = 0.7;
const LOW_COVERAGE: f64 = 0.3;
/// Share of learnings above which one learning type dominates
const TYPE_DOMINANCE: f64 = 0.6;

#[derive(Debug, Clone, Default)]
pub struct Refiner {
    config: RefinerConfig,
}

impl Refiner {
    pub fn new(config: RefinerConfig) -> Self {
        Self { config }
    }

    /// Decide whether to run another round.
    ///
    /// `all_learnings` ends with the evaluation's own learnings; `all_queries`
    /// holds every query issued so far.
    pub fn refine_search_strategy(
        &self,
        query: &str,
        evaluation: &ResearchEvaluation,
        plan: &ResearchPlan,
        all_learnings: &[Learning],
        all_queries: &[String],
    ) -> RefinementDecision {
        let completeness = &evaluation.completeness;
        let stop = |reason: RefinementReason, guidance: String| {
            info!(
                query = %query,
                reason = %reason,
                coverage = completeness.coverage,
                "Stopping research"
            );
            RefinementDecision {
                should_continue: false,
                reason,
                research_directions: Vec::new(),
                strategic_guidance: guidance,
                confidence: completeness.confidence,
            }
        };

        if evaluation.recommends_synthesis() {
            return stop(
                RefinementReason::EvaluationRecommendsSynthesis,
                format!("Proceed to synthesis. {}", completeness.reasoning),
            );
        }

        if completeness.has_enough_info && completeness.coverage > HIGH_COVERAGE {
            return stop(
                RefinementReason::HighCoverageAchieved,
                format!(
                    "Coverage of {:.0}% is sufficient. Proceed to synthesis.",
                    completeness.coverage * 100.0
                ),
            );
        }

        if evaluation.research_directions.is_empty() {
            return stop(
                RefinementReason::NoResearchDirectionsAvailable,
                "No further research directions were identified. Proceed to synthesis.".to_string(),
            );
        }

        if completeness.coverage > DIMINISHING_COVERAGE
            && self.detect_diminishing_returns(&evaluation.learnings, all_learnings)
        {
            return stop(
                RefinementReason::DiminishingReturnsDetected,
                "Recent findings mostly repeat earlier ones. Proceed to synthesis.".to_string(),
            );
        }

        let research_directions =
            self.filter_new_queries(&evaluation.research_directions, all_queries);
        let strategic_guidance = Self::strategic_guidance(evaluation, plan, all_learnings);

        info!(
            query = %query,
            directions = research_directions.len(),
            queries = research_directions.iter().map(|d| d.search_queries.len()).sum::<usize>(),
            "Continuing research"
        );

        RefinementDecision {
            should_continue: true,
            reason: RefinementReason::ContinueResearch,
            research_directions,
            strategic_guidance,
            confidence: completeness.confidence,
        }
    }

    /// Drop queries too close to anything already issued or already kept,
    /// then drop directions left with nothing to search.
    fn filter_new_queries(
        &self,
        directions: &[ResearchDirection],
        issued: &[String],
    ) -> Vec<ResearchDirection> {
        let mut known: Vec<String> = issued.to_vec();
        let mut kept = Vec::new();

        for direction in directions {
            let mut queries = Vec::new();
            for candidate in &direction.search_queries {
                let duplicate = known
                    .iter()
                    .any(|k| token_overlap_ratio(k, candidate) > self.config.query_similarity);
                if duplicate {
                    debug!(query = %candidate, "Dropping query similar to an earlier one");
                    continue;
                }
                known.push(candidate.clone());
                queries.push(candidate.clone());
            }
            if !queries.is_empty() {
                kept.push(ResearchDirection {
                    question: direction.question.clone(),
                    rationale: direction.rationale.clone(),
                    search_queries: queries,
                });
            }
        }
        kept
    }

    /// True when too few of the newest learnings say anything new
    fn detect_diminishing_returns(&self, newest: &[Learning], all_learnings: &[Learning]) -> bool {
        if all_learnings.len() < self.config.min_learnings {
            return false;
        }
        if newest.is_empty() {
            return true;
        }

        let prior = &all_learnings[..all_learnings.len().saturating_sub(newest.len())];
        let novel = newest
            .iter()
            .filter(|n| {
                !prior.iter().any(|p| {
                    token_overlap_ratio(&p.content, &n.content) > self.config.learning_similarity
                })
            })
            .count();

        let novelty = novel as f64 / newest.len() as f64;
        debug!(novel, total = newest.len(), novelty, "Novelty of latest learnings");
        novelty < self.config.min_novelty
    }

    fn strategic_guidance(
        evaluation: &ResearchEvaluation,
        plan: &ResearchPlan,
        all_learnings: &[Learning],
    ) -> String {
        let completeness = &evaluation.completeness;
        let mut guidance = if completeness.coverage < LOW_COVERAGE {
            format!(
                "Coverage is low ({:.0}%). Broaden the search to the fundamentals of: {}.",
                completeness.coverage * 100.0,
                plan.original_query
            )
        } else if completeness.coverage < DIMINISHING_COVERAGE {
            format!(
                "Coverage is moderate ({:.0}%). Focus on the open knowledge gaps.",
                completeness.coverage * 100.0
            )
        } else {
            format!(
                "Coverage is high ({:.0}%). Target the remaining specifics and verify key claims.",
                completeness.coverage * 100.0
            )
        };

        let gaps: Vec<&str> = completeness
            .knowledge_gaps
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        if !gaps.is_empty() {
            guidance.push_str(&format!(" Gaps: {}.", gaps.join("; ")));
        }

        if let Some(note) = Self::learning_type_imbalance(all_learnings) {
            guidance.push(' ');
            guidance.push_str(&note);
        }
        guidance
    }

    fn learning_type_imbalance(learnings: &[Learning]) -> Option<String> {
        if learnings.len() < 3 {
            return None;
        }
        let mut counts: HashMap<LearningType, usize> = HashMap::new();
        for learning in learnings {
            *counts.entry(learning.learning_type).or_default() += 1;
        }
        let (dominant, count) = counts.iter().max_by_key(|(_, c)| **c)?;
        if (*count as f64 / learnings.len() as f64) <= TYPE_DOMINANCE {
            return None;
        }

        let missing: Vec<&str> = [
            LearningType::Factual,
            LearningType::Analytical,
            LearningType::Procedural,
            LearningType::Statistical,
        ]
        .iter()
        .filter(|t| !counts.contains_key(t))
        .map(|t| t.as_str())
        .collect();

        Some(if missing.is_empty() {
            format!("Findings lean heavily {}; seek other kinds of evidence.", dominant.as_str())
        } else {
            format!(
                "Findings lean heavily {}; look for {} sources.",
                dominant.as_str(),
                missing.join(" and ")
            )
        })
    }

    /// Final cleanup before synthesis
    pub fn filter_content(content: &[RefinedContent], max_sources: usize) -> Vec<RefinedContent> {
        let mut seen = HashSet::new();
        content
            .iter()
            .filter(|c| !c.summary.trim().is_empty())
            .filter(|c| seen.insert(c.url.clone()))
            .take(max_sources)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompletenessAssessment, RecommendedAction, SubQuery};
    use chrono::Utc;

    fn plan() -> ResearchPlan {
        ResearchPlan {
            id: "plan".to_string(),
            original_query: "AI in healthcare".to_string(),
            sub_queries: vec![SubQuery::new("AI applications in healthcare")],
            search_strategy: "broad".to_string(),
            estimated_steps: 3,
            strategic_plan: None,
        }
    }

    fn learning(content: &str, learning_type: LearningType) -> Learning {
        Learning {
            content: content.to_string(),
            learning_type,
            entities: Vec::new(),
            confidence: 0.8,
            source_url: None,
        }
    }

    fn direction(queries: &[&str]) -> ResearchDirection {
        ResearchDirection {
            question: "What next?".to_string(),
            rationale: "gap".to_string(),
            search_queries: queries.iter().map(|q| q.to_string()).collect(),
        }
    }

    fn evaluation(
        action: RecommendedAction,
        coverage: f64,
        has_enough_info: bool,
        learnings: Vec<Learning>,
        directions: Vec<ResearchDirection>,
    ) -> ResearchEvaluation {
        ResearchEvaluation {
            learnings,
            completeness: CompletenessAssessment {
                coverage,
                confidence: 0.6,
                knowledge_gaps: vec!["regulation".to_string()],
                has_enough_info,
                recommended_action: action,
                reasoning: "because".to_string(),
            },
            research_directions: directions,
        }
    }

    #[test]
    fn test_synthesis_recommendation_wins() {
        let eval = evaluation(
            RecommendedAction::Synthesize,
            0.1,
            false,
            vec![],
            vec![direction(&["x"])],
        );
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &[], &[]);
        assert!(!decision.should_continue);
        assert_eq!(decision.reason.as_str(), "evaluation_recommends_synthesis");
    }

    #[test]
    fn test_high_coverage_stops() {
        let eval = evaluation(
            RecommendedAction::Continue,
            0.85,
            true,
            vec![],
            vec![direction(&["x"])],
        );
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &[], &[]);
        assert_eq!(decision.reason, RefinementReason::HighCoverageAchieved);

        let eval = evaluation(
            RecommendedAction::Continue,
            0.85,
            false,
            vec![],
            vec![direction(&["x"])],
        );
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &[], &[]);
        assert!(decision.should_continue);
    }

    #[test]
    fn test_no_directions_stops() {
        let eval = evaluation(RecommendedAction::Continue, 0.5, false, vec![], vec![]);
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &[], &[]);
        assert_eq!(decision.reason, RefinementReason::NoResearchDirectionsAvailable);
    }

    #[test]
    fn test_similar_queries_are_excluded() {
        let eval = evaluation(
            RecommendedAction::Continue,
            0.4,
            false,
            vec![],
            vec![
                direction(&[
                    "AI applications in health care industry",
                    "FDA approval of diagnostic AI",
                ]),
                direction(&["AI applications in healthcare"]),
            ],
        );
        let issued = vec!["AI applications in healthcare".to_string()];

        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &[], &issued);

        assert!(decision.should_continue);
        assert_eq!(decision.reason, RefinementReason::ContinueResearch);
        assert_eq!(decision.research_directions.len(), 1);
        assert_eq!(decision.next_queries(), vec!["FDA approval of diagnostic AI"]);
    }

    #[test]
    fn test_accepted_queries_dedupe_each_other() {
        let eval = evaluation(
            RecommendedAction::Continue,
            0.4,
            false,
            vec![],
            vec![direction(&["deep learning radiology"]), direction(&["radiology deep learning"])],
        );
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &[], &[]);
        assert_eq!(decision.next_queries(), vec!["deep learning radiology"]);
    }

    #[test]
    fn test_query_at_exact_threshold_is_kept() {
        let issued = vec!["alpha beta gamma delta epsilon zeta eta theta iota kappa".to_string()];
        let candidate = "alpha beta gamma delta epsilon zeta eta lambda mu nu";
        assert_eq!(token_overlap_ratio(&issued[0], candidate), 0.7);

        let eval = evaluation(
            RecommendedAction::Continue,
            0.4,
            false,
            vec![],
            vec![direction(&[candidate])],
        );
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &[], &issued);

        assert!(decision.should_continue);
        assert_eq!(decision.next_queries(), vec![candidate]);
    }

    #[test]
    fn test_diminishing_returns() {
        let prior: Vec<Learning> = (0..9)
            .map(|i| {
                learning(
                    &format!("hospital adoption figure {} rose sharply", i),
                    LearningType::Statistical,
                )
            })
            .collect();
        let newest = vec![
            learning("hospital adoption figure 3 rose sharply again", LearningType::Statistical),
            learning("hospital adoption figure 5 rose sharply", LearningType::Statistical),
        ];
        let mut all = prior.clone();
        all.extend(newest.clone());

        let eval = evaluation(
            RecommendedAction::Continue,
            0.75,
            false,
            newest.clone(),
            vec![direction(&["new angle"])],
        );
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &all, &[]);
        assert_eq!(decision.reason, RefinementReason::DiminishingReturnsDetected);

        let eval = evaluation(
            RecommendedAction::Continue,
            0.65,
            false,
            newest,
            vec![direction(&["new angle"])],
        );
        let decision = Refiner::default().refine_search_strategy("q", &eval, &plan(), &all, &[]);
        assert!(decision.should_continue);
    }

    #[test]
    fn test_few_learnings_never_diminishing() {
        let newest = vec![learning("same", LearningType::Factual)];
        let all = vec![
            learning("same", LearningType::Factual),
            learning("same", LearningType::Factual),
        ];
        assert!(!Refiner::default().detect_diminishing_returns(&newest, &all));
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = Refiner::new(RefinerConfig {
            query_similarity: 0.8,
            ..RefinerConfig::default()
        });
        let eval = evaluation(
            RecommendedAction::Continue,
            0.4,
            false,
            vec![],
            vec![direction(&["AI applications in health care industry"])],
        );
        let issued = vec!["AI applications in healthcare".to_string()];
        let decision = strict.refine_search_strategy("q", &eval, &plan(), &[], &issued);
        assert_eq!(decision.next_queries().len(), 1);
    }

    #[test]
    fn test_guidance_tiers_and_imbalance() {
        let learnings = vec![
            learning("a", LearningType::Factual),
            learning("b", LearningType::Factual),
            learning("c", LearningType::Factual),
        ];
        let low = evaluation(
            RecommendedAction::Continue,
            0.2,
            false,
            vec![],
            vec![direction(&["x"])],
        );
        let guidance = Refiner::strategic_guidance(&low, &plan(), &learnings);
        assert!(guidance.starts_with("Coverage is low"));
        assert!(guidance.contains("regulation"));
        assert!(guidance.contains("lean heavily factual"));
        assert!(guidance.contains("statistical"));

        let moderate = evaluation(RecommendedAction::Continue, 0.5, false, vec![], vec![]);
        let guidance = Refiner::strategic_guidance(&moderate, &plan(), &[]);
        assert!(guidance.starts_with("Coverage is moderate"));
        let high = evaluation(RecommendedAction::Continue, 0.75, false, vec![], vec![]);
        let guidance = Refiner::strategic_guidance(&high, &plan(), &[]);
        assert!(guidance.starts_with("Coverage is high"));
    }

    #[test]
    fn test_filter_content() {
        let item = |url: &str, summary: &str| RefinedContent {
            title: "t".to_string(),
            url: url.to_string(),
            summary: summary.to_string(),
            raw_length: 10,
            scraped_at: Utc::now(),
        };
        let content = vec![
            item("https://a.example/", "alpha"),
            item("https://b.example/", "  "),
            item("https://a.example/", "alpha again"),
            item("https://c.example/", "gamma"),
            item("https://d.example/", "delta"),
        ];
        let filtered = Refiner::filter_content(&content, 2);
        let urls: Vec<&str> = filtered.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.example/", "https://c.example/"]);
    }
}
