use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use steel_deep_research::agents::{prompts, DeepResearchAgent};
use steel_deep_research::events::{ResearchEvent, RunContext};
use steel_deep_research::models::ResearchOptions;
use steel_deep_research::search::ScrapedPage;
use steel_deep_research::test_support::{FakeBrowser, ScriptedLLM};
use steel_deep_research::types::AppError;
use tokio::sync::mpsc::UnboundedReceiver;

const REPORT: &str = r##"{
    "executiveSummary": "Paris is the capital of France.",
    "content": "# Capital of France\n\nParis is the capital of France [1]."
}"##;

/// Scripted model: fixed planner queries, an evaluator driven by `evaluate`
/// (called with the 0-based evaluation count), canned summaries and report.
fn scripted<F>(planned: &[&str], evaluate: F) -> ScriptedLLM
where
    F: Fn(usize) -> String + Send + Sync + 'static,
{
    let extraction =
        serde_json::json!({ "strategy": "web search", "queries": planned }).to_string();
    let evaluations = AtomicUsize::new(0);
    ScriptedLLM::new(move |request| match request.system_instruction.as_deref() {
        Some(prompts::PLANNER_SYSTEM) => "Search for the answer, then verify it.".to_string(),
        Some(prompts::QUERY_EXTRACTION_SYSTEM) => extraction.clone(),
        Some(prompts::SUMMARIZER_SYSTEM) => "Paris is the capital of France.".to_string(),
        Some(prompts::EVALUATOR_SYSTEM) => evaluate(evaluations.fetch_add(1, Ordering::SeqCst)),
        Some(prompts::SYNTHESIZER_SYSTEM) => REPORT.to_string(),
        _ => String::new(),
    })
}

fn evaluation_json(action: &str, coverage: f64, learning: &str, queries: &[&str]) -> String {
    let directions = if queries.is_empty() {
        serde_json::json!([])
    } else {
        serde_json::json!([{
            "question": "What else?",
            "rationale": "gap",
            "searchQueries": queries
        }])
    };
    serde_json::json!({
        "learnings": [{
            "content": learning,
            "type": "factual",
            "entities": [],
            "confidence": 0.8
        }],
        "completenessAssessment": {
            "coverage": coverage,
            "confidence": 0.6,
            "knowledgeGaps": ["more detail"],
            "hasEnoughInfo": false,
            "recommendedAction": action,
            "reasoning": "Evaluated"
        },
        "researchDirections": directions
    })
    .to_string()
}

/// Every query gets its own `links` result URLs
fn browser_with_fresh_results(links: usize) -> FakeBrowser {
    FakeBrowser::new().with_search_fallback(move |query| {
        let slug = query.to_lowercase().replace(' ', "-");
        let urls: Vec<(String, String)> = (0..links)
            .map(|i| (format!("{} {}", query, i), format!("https://{}.example.com/{}", slug, i)))
            .collect();
        let refs: Vec<(&str, &str)> = urls.iter().map(|(t, u)| (t.as_str(), u.as_str())).collect();
        FakeBrowser::results_page(query, &refs)
    })
}

fn options(depth: u32, breadth: u32, max_sources: usize, per_query: usize) -> ResearchOptions {
    ResearchOptions {
        depth,
        breadth,
        max_sources,
        max_results_per_query: per_query,
        ..Default::default()
    }
}

fn collect_events(rx: &mut UnboundedReceiver<ResearchEvent>) -> Vec<ResearchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn capital_of_france_end_to_end() {
    let llm = scripted(&["capital of France"], |_| unreachable!("depth 1 never evaluates"));
    let browser = FakeBrowser::new()
        .with_results(
            "capital of France",
            &[("Paris - Wikipedia", "https://en.wikipedia.org/wiki/Paris")],
        )
        .with_page(
            "https://en.wikipedia.org/wiki/Paris",
            "Paris - Wikipedia",
            "Paris is the capital and largest city of France.",
        );
    let agent = DeepResearchAgent::new(Arc::new(llm.llm()), Arc::new(browser));
    let (ctx, mut rx) = RunContext::with_channel();

    let report = agent
        .research(&ctx, "What is the capital of France?", &options(1, 1, 60, 5), &[])
        .await
        .unwrap();

    assert!(report.content.contains("Paris"));
    assert!(!report.citations.is_empty());
    assert_eq!(report.citations[0].url, "https://en.wikipedia.org/wiki/Paris");
    assert_eq!(report.metadata.iterations, 1);
    assert_eq!(report.metadata.termination, "max_depth_reached");
    assert!(llm.calls_with_system(prompts::EVALUATOR_SYSTEM).is_empty());

    let events = collect_events(&mut rx);
    assert!(events.iter().all(|e| e.session_id() == ctx.session_id()));
    assert!(matches!(events.last(), Some(ResearchEvent::Completed { sources: 1, .. })));
}

#[tokio::test]
async fn loop_is_bounded_by_depth() {
    let follow_ups = [
        "solar panel efficiency",
        "wind turbine maintenance",
        "battery chemistry recycling",
        "grid storage economics",
    ];
    let llm = scripted(&["renewable energy trends"], move |n| {
        evaluation_json("continue", 0.4, &format!("finding number {}", n), &[follow_ups[n]])
    });
    let browser = Arc::new(browser_with_fresh_results(2));
    let agent = DeepResearchAgent::new(Arc::new(llm.llm()), browser.clone());

    let report = agent
        .research(&RunContext::new(), "renewable energy", &options(3, 1, 60, 2), &[])
        .await
        .unwrap();

    assert_eq!(report.metadata.iterations, 3);
    assert_eq!(report.metadata.termination, "max_depth_reached");
    assert_eq!(llm.calls_with_system(prompts::EVALUATOR_SYSTEM).len(), 2);
    assert_eq!(
        browser.searches(),
        vec!["renewable energy trends", "solar panel efficiency", "wind turbine maintenance"]
    );
    assert_eq!(report.metadata.total_sources, 6);
    assert_eq!(report.metadata.total_learnings, 2);
}

#[tokio::test]
async fn sources_never_exceed_max_sources() {
    let llm = scripted(&["first topic", "second topic"], |_| {
        unreachable!("memory limit skips evaluation")
    });
    let agent = DeepResearchAgent::new(
        Arc::new(llm.llm()),
        Arc::new(browser_with_fresh_results(5)),
    );

    let report = agent
        .research(&RunContext::new(), "topics", &options(3, 2, 3, 5), &[])
        .await
        .unwrap();

    assert_eq!(report.metadata.total_sources, 3);
    assert_eq!(report.citations.len(), 3);
    assert_eq!(report.metadata.termination, "memory_limit_reached");
    assert_eq!(report.metadata.final_coverage, Some(0.8));
    assert!(llm.calls_with_system(prompts::EVALUATOR_SYSTEM).is_empty());
}

#[tokio::test]
async fn accumulated_urls_are_unique() {
    let shared = [
        ("Shared A", "https://shared.example.com/a"),
        ("Shared B", "https://shared.example.com/b"),
    ];
    let browser = Arc::new(
        FakeBrowser::new()
            .with_results("rust async runtimes", &shared)
            .with_results(
                "tokio vs async-std",
                &[shared[0], shared[1], ("Only C", "https://other.example.com/c")],
            ),
    );
    let llm = scripted(&["rust async runtimes", "tokio vs async-std"], |_| unreachable!());
    let agent = DeepResearchAgent::new(Arc::new(llm.llm()), browser.clone());

    let report = agent
        .research(&RunContext::new(), "rust async", &options(1, 2, 60, 5), &[])
        .await
        .unwrap();

    let urls: Vec<&str> = report.citations.iter().map(|c| c.url.as_str()).collect();
    let unique: HashSet<&str> = urls.iter().copied().collect();
    assert_eq!(urls.len(), 3);
    assert_eq!(unique.len(), urls.len());

    let scrapes = browser.scrapes();
    let unique_scrapes: HashSet<&String> = scrapes.iter().collect();
    assert_eq!(unique_scrapes.len(), scrapes.len());
}

#[tokio::test]
async fn similar_follow_up_queries_are_not_repeated() {
    let llm = scripted(&["AI applications in healthcare"], |_| {
        evaluation_json(
            "continue",
            0.4,
            "AI reads scans",
            &["AI applications in health care industry"],
        )
    });
    let browser = Arc::new(browser_with_fresh_results(1));
    let agent = DeepResearchAgent::new(Arc::new(llm.llm()), browser.clone());

    let report = agent
        .research(&RunContext::new(), "AI in healthcare", &options(3, 1, 60, 1), &[])
        .await
        .unwrap();

    assert_eq!(browser.searches(), vec!["AI applications in healthcare"]);
    assert_eq!(report.metadata.iterations, 1);
    assert_eq!(report.metadata.termination, "no_research_directions_available");
    assert_eq!(report.metadata.total_learnings, 1);
}

#[tokio::test]
async fn evaluator_can_end_research_early() {
    let llm = scripted(&["capital of France"], |_| {
        evaluation_json("synthesize", 0.9, "Paris", &[])
    });
    let agent = DeepResearchAgent::new(
        Arc::new(llm.llm()),
        Arc::new(browser_with_fresh_results(1)),
    );

    let report = agent
        .research(&RunContext::new(), "capital of France", &options(3, 1, 60, 1), &[])
        .await
        .unwrap();

    assert_eq!(report.metadata.iterations, 1);
    assert_eq!(report.metadata.termination, "evaluation_recommends_synthesis");
    assert_eq!(report.metadata.final_coverage, Some(0.9));
    assert_eq!(report.metadata.total_learnings, 1);
}

#[tokio::test]
async fn evaluator_failure_falls_back_to_synthesis() {
    let llm = ScriptedLLM::with_results(|request| match request.system_instruction.as_deref() {
        Some(prompts::PLANNER_SYSTEM) => Ok("Search broadly.".to_string()),
        Some(prompts::QUERY_EXTRACTION_SYSTEM) => {
            Ok(r#"{"strategy":"web search","queries":["capital of France"]}"#.to_string())
        }
        Some(prompts::SUMMARIZER_SYSTEM) => Ok("Paris is the capital of France.".to_string()),
        Some(prompts::EVALUATOR_SYSTEM) => Err(AppError::LLMApi("evaluator timed out".to_string())),
        Some(prompts::SYNTHESIZER_SYSTEM) => Ok(REPORT.to_string()),
        _ => Ok(String::new()),
    });
    let agent = DeepResearchAgent::new(
        Arc::new(llm.llm()),
        Arc::new(browser_with_fresh_results(2)),
    );

    let report = agent
        .research(&RunContext::new(), "capital of France", &options(3, 1, 60, 2), &[])
        .await
        .unwrap();

    assert_eq!(llm.calls_with_system(prompts::EVALUATOR_SYSTEM).len(), 1);
    assert_eq!(report.metadata.iterations, 1);
    assert_eq!(report.metadata.termination, "evaluation_recommends_synthesis");
    assert_eq!(report.metadata.total_sources, 2);
    assert_eq!(report.metadata.total_learnings, 0);
    assert_eq!(report.metadata.final_confidence, Some(0.4));
    assert!(report.content.contains("Paris"));
}

#[tokio::test]
async fn failing_query_is_skipped() {
    let llm = scripted(&["broken query", "working query"], |_| unreachable!());
    let browser = FakeBrowser::new()
        .failing_query("broken query")
        .with_results("working query", &[("Works", "https://works.example.com/")]);
    let agent = DeepResearchAgent::new(Arc::new(llm.llm()), Arc::new(browser));
    let (ctx, mut rx) = RunContext::with_channel();

    let report = agent
        .research(&ctx, "anything", &options(1, 2, 60, 5), &[])
        .await
        .unwrap();

    assert_eq!(report.metadata.total_sources, 1);
    let failed = collect_events(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, ResearchEvent::ToolResult { success: false, .. }))
        .count();
    assert_eq!(failed, 1);
}

#[tokio::test]
async fn planner_failure_is_reported_and_returned() {
    let llm = ScriptedLLM::failing("provider unavailable");
    let agent = DeepResearchAgent::new(Arc::new(llm.llm()), Arc::new(FakeBrowser::new()));
    let (ctx, mut rx) = RunContext::with_channel();

    let result = agent
        .research(&ctx, "anything", &ResearchOptions::default(), &[])
        .await;

    assert!(matches!(result, Err(AppError::LLMApi(_))));
    let events = collect_events(&mut rx);
    assert!(matches!(
        events.last(),
        Some(ResearchEvent::Error { message, .. }) if message.contains("provider unavailable")
    ));
}

#[tokio::test]
async fn no_sources_fails_evaluation_input_check() {
    let llm = scripted(&["nothing here"], |_| unreachable!());
    let browser = FakeBrowser::new().with_search_fallback(|query| ScrapedPage {
        url: format!("https://www.google.com/search?q={}", query),
        title: None,
        markdown: "No results found.".to_string(),
        html: None,
    });
    let agent = DeepResearchAgent::new(Arc::new(llm.llm()), Arc::new(browser));

    let result = agent
        .research(&RunContext::new(), "obscure", &options(2, 1, 60, 5), &[])
        .await;

    assert!(matches!(result, Err(AppError::InvalidRequest(_))));
}
