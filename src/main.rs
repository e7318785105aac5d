use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use steel_deep_research::{
    agents::{DeepResearchAgent, PlanningAgent},
    config::Config,
    events::{ResearchEvent, RunContext},
    models::ResearchReport,
    utils::init_logger,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const MAX_CLARIFYING_QUESTIONS: usize = 3;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The research question (prompted for in interactive mode when omitted)
    query: Option<String>,

    /// Maximum number of research iterations
    #[arg(short, long)]
    depth: Option<u32>,

    /// Maximum number of search queries per iteration
    #[arg(short, long)]
    breadth: Option<u32>,

    /// Maximum number of sources to collect
    #[arg(long)]
    max_sources: Option<usize>,

    /// Token budget for each page summary
    #[arg(long)]
    summary_tokens: Option<u32>,

    /// Answer clarifying questions before research starts
    #[arg(short, long)]
    interactive: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let _log_guard = init_logger(&config.logging);

    let mut options = config.research.options();
    if let Some(depth) = args.depth {
        options.depth = depth;
    }
    if let Some(breadth) = args.breadth {
        options.breadth = breadth;
    }
    if let Some(max_sources) = args.max_sources {
        options.max_sources = max_sources;
    }
    if let Some(summary_tokens) = args.summary_tokens {
        options.summary_tokens = summary_tokens;
    }

    let agent = DeepResearchAgent::from_config(&config)?;
    info!(model = %agent.llm().model(), provider = %agent.llm().provider_name(), "Agent ready");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let query = match args.query {
        Some(query) => query,
        None if args.interactive => {
            prompt("Research question: ")?;
            stdin.next_line().await?.unwrap_or_default()
        }
        None => anyhow::bail!("a research question is required (or pass --interactive)"),
    };

    let (ctx, mut events) = RunContext::with_channel();
    let printer = tokio::spawn(async move {
        let mut streaming_plan = false;
        while let Some(event) = events.recv().await {
            print_event(&event, &mut streaming_plan);
        }
    });

    let mut follow_up = Vec::new();
    if args.interactive {
        let questions = PlanningAgent::clarifying_questions(
            &ctx,
            agent.llm(),
            &query,
            MAX_CLARIFYING_QUESTIONS,
        )
        .await;
        match questions {
            Ok(questions) => {
                for question in questions {
                    prompt(&format!("{}\n> ", question))?;
                    let answer = stdin.next_line().await?.unwrap_or_default();
                    if !answer.trim().is_empty() {
                        follow_up.push(format!("Q: {} A: {}", question, answer.trim()));
                    }
                }
            }
            Err(e) => warn!(error = %e, "Could not generate clarifying questions"),
        }
    }

    let result = agent.research(&ctx, &query, &options, &follow_up).await;
    drop(ctx);
    printer.await?;

    let report = result?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn prompt(text: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{}", text)?;
    stderr.flush()
}

fn print_event(event: &ResearchEvent, streaming_plan: &mut bool) {
    if *streaming_plan && !matches!(event, ResearchEvent::PlanToken { .. }) {
        eprintln!();
        *streaming_plan = false;
    }

    match event {
        ResearchEvent::Progress { phase, message, current_depth, max_depth, .. } => {
            eprintln!("[{:?} {}/{}] {}", phase, current_depth, max_depth, message);
        }
        ResearchEvent::PlanToken { text, .. } => {
            eprint!("{}", text);
            *streaming_plan = true;
        }
        ResearchEvent::ToolCall { tool, input, .. } => {
            eprintln!("  {:?}: {}", tool, input);
        }
        ResearchEvent::ToolResult { tool, success, output, .. } => {
            let status = if *success { "ok" } else { "failed" };
            eprintln!("  {:?} {}: {}", tool, status, output);
        }
        ResearchEvent::Error { message, .. } => {
            eprintln!("error: {}", message);
        }
        ResearchEvent::Completed { sources, .. } => {
            eprintln!("Research complete with {} sources", sources);
        }
    }
}

fn print_report(report: &ResearchReport) {
    println!("# {}\n", report.query);
    if !report.executive_summary.is_empty() {
        println!("{}\n", report.executive_summary);
    }
    println!("{}", report.content);
    println!(
        "\n---\n{} iterations, {} sources, {} learnings, stopped on {} ({} ms)",
        report.metadata.iterations,
        report.metadata.total_sources,
        report.metadata.total_learnings,
        report.metadata.termination,
        report.metadata.duration_ms
    );
}
