// System instructions and prompt builders for each agent

use crate::models::{Learning, RefinedContent, ResearchPlan};

pub const PLANNER_SYSTEM: &str = "You are a research strategist. Break a research question \
into a clear, step-by-step investigation plan covering the distinct angles worth searching.";

pub const QUERY_EXTRACTION_SYSTEM: &str =
    "You turn research plans into concrete web search queries. Respond with ONLY a JSON object.";

pub const CLARIFICATION_SYSTEM: &str = "You help scope research requests by asking short \
clarifying questions. Respond with ONLY a JSON object.";

pub const SUMMARIZER_SYSTEM: &str = "You summarize web pages for a researcher. Keep facts, \
figures, names and dates that bear on the research question. Omit navigation, ads and \
boilerplate.";

pub const EVALUATOR_SYSTEM: &str = "You evaluate research progress. Extract learnings from the \
sources, judge how completely they answer the question, and propose follow-up research directions. \
Respond with ONLY a JSON object.";

pub const SYNTHESIZER_SYSTEM: &str = "You write comprehensive, well-structured research reports. \
Cite sources inline with bracketed numbers such as [1] that refer to the numbered source list. \
Respond with ONLY a JSON object.";

fn dialogue_section(follow_up: &[String]) -> String {
    if follow_up.is_empty() {
        return String::new();
    }
    format!(
        "\nCLARIFICATIONS FROM THE USER:\n{}\n",
        follow_up
            .iter()
            .map(|line| format!("- {}", line))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

pub fn strategic_plan_prompt(
    query: &str,
    depth: u32,
    breadth: u32,
    follow_up: &[String],
) -> String {
    format!(
        r#"RESEARCH QUESTION:
{query}
{dialogue}
Write a research plan for answering this question with web searches.
The research will run for at most {depth} rounds of up to {breadth} searches each.
Describe the key aspects to investigate, the order to investigate them in, and
what kind of sources would be most authoritative."#,
        query = query,
        dialogue = dialogue_section(follow_up),
        depth = depth,
        breadth = breadth,
    )
}

pub fn query_extraction_prompt(query: &str, plan: &str, breadth: u32) -> String {
    format!(
        r#"RESEARCH QUESTION:
{query}

RESEARCH PLAN:
{plan}

Produce at most {breadth} distinct web search queries that start this plan.

OUTPUT FORMAT:
{{
  "strategy": "one sentence describing the search strategy",
  "queries": ["query 1", "query 2"]
}}"#
    )
}

pub fn clarification_prompt(query: &str, max_questions: usize) -> String {
    format!(
        r#"RESEARCH REQUEST:
{query}

Ask at most {max_questions} short questions whose answers would most improve the
focus of this research. Ask none if the request is already specific.

OUTPUT FORMAT:
{{ "questions": ["question 1"] }}"#
    )
}

pub fn summary_prompt(query: &str, title: &str, url: &str, page: &str) -> String {
    format!(
        r#"RESEARCH QUESTION:
{query}

SOURCE: {title}
URL: {url}

PAGE CONTENT:
{page}

Summarize what this page contributes to the research question."#
    )
}

pub fn evaluation_prompt(
    query: &str,
    plan: &ResearchPlan,
    sources: &[(String, String, String)],
    current_depth: u32,
    max_depth: u32,
    breadth: u32,
) -> String {
    let sub_queries = plan
        .sub_queries
        .iter()
        .map(|q| format!("- {}", q.query))
        .collect::<Vec<_>>()
        .join("\n");
    let sources = sources
        .iter()
        .enumerate()
        .map(|(i, (title, url, summary))| format!("[{}] {} ({})\n{}", i + 1, title, url, summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"RESEARCH QUESTION:
{query}

SEARCH STRATEGY:
{strategy}

QUERIES ISSUED THIS ROUND:
{sub_queries}

ROUND: {round} of {max_depth}

SOURCES:
{sources}

Evaluate the research so far.

OUTPUT FORMAT:
{{
  "learnings": [
    {{
      "content": "a specific finding",
      "type": "factual | analytical | procedural | statistical",
      "entities": ["named entities"],
      "confidence": 0.0,
      "sourceUrl": "url of the supporting source"
    }}
  ],
  "completenessAssessment": {{
    "coverage": 0.0,
    "confidence": 0.0,
    "knowledgeGaps": ["what is still unknown"],
    "hasEnoughInfo": false,
    "recommendedAction": "continue | synthesize",
    "reasoning": "why"
  }},
  "researchDirections": [
    {{
      "question": "open question",
      "rationale": "why it matters",
      "searchQueries": ["at most {breadth} queries"]
    }}
  ]
}}

coverage and confidence are between 0 and 1. Recommend "continue" only together
with at least one research direction."#,
        query = query,
        strategy = plan.search_strategy,
        sub_queries = sub_queries,
        round = current_depth + 1,
        max_depth = max_depth,
        sources = sources,
        breadth = breadth,
    )
}

pub fn synthesis_prompt(query: &str, content: &[RefinedContent], learnings: &[Learning]) -> String {
    let sources = content
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] {}\nURL: {}\n{}", i + 1, c.title, c.url, c.summary))
        .collect::<Vec<_>>()
        .join("\n\n");
    let learnings = if learnings.is_empty() {
        "(none extracted)".to_string()
    } else {
        learnings
            .iter()
            .map(|l| format!("- ({}) {}", l.learning_type.as_str(), l.content))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"RESEARCH QUESTION:
{query}

KEY LEARNINGS:
{learnings}

NUMBERED SOURCES:
{sources}

Write the final research report in markdown, citing the numbered sources.

OUTPUT FORMAT:
{{
  "executiveSummary": "two or three sentence answer",
  "content": "the full markdown report"
}}"#
    )
}
