//! Synthesis Agent
//!
//! Writes the final report from the filtered sources and accumulated
//! learnings. This is the last step of a run.

use crate::agents::prompts;
use crate::events::{ResearchPhase, RunContext};
use crate::llm::structured::parse_json;
use crate::llm::LLM;
use crate::models::{Citation, Learning, RefinedContent};
use crate::types::AppResult;
use crate::utils::truncate_chars;
use serde::Deserialize;
use tracing::{info, warn};

const SYNTHESIS_MAX_TOKENS: u32 = 4096;
const SUMMARY_FALLBACK_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisWire {
    #[serde(default)]
    executive_summary: String,
    content: String,
}

/// Report body before run metadata is attached
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub executive_summary: String,
    pub content: String,
    pub citations: Vec<Citation>,
}

pub struct SynthesisAgent;

impl SynthesisAgent {
    pub async fn synthesize(
        ctx: &RunContext,
        llm: &LLM,
        query: &str,
        content: &[RefinedContent],
        learnings: &[Learning],
        depth: u32,
    ) -> AppResult<Synthesis> {
        info!(
            session_id = %ctx.session_id(),
            sources = content.len(),
            learnings = learnings.len(),
            "Synthesizing report"
        );
        ctx.progress(ResearchPhase::Synthesizing, "Writing final report", depth, depth);

        let request = llm
            .request(
                prompts::SYNTHESIZER_SYSTEM,
                prompts::synthesis_prompt(query, content, learnings),
            )
            .with_max_tokens(SYNTHESIS_MAX_TOKENS)
            .json();
        let text = llm.generate_text(&request).await?;

        let (executive_summary, body) = match parse_json::<SynthesisWire>(&text) {
            Ok(wire) if !wire.content.trim().is_empty() => {
                let summary = if wire.executive_summary.trim().is_empty() {
                    Self::first_paragraph(&wire.content)
                } else {
                    wire.executive_summary.trim().to_string()
                };
                (summary, wire.content.trim().to_string())
            }
            Ok(_) | Err(_) => {
                warn!("Synthesis response was not the expected JSON, using raw text");
                (Self::first_paragraph(&text), text.trim().to_string())
            }
        };

        let citations = Self::citations(content);
        let body = Self::with_source_list(body, &citations);

        info!(report_len = body.len(), citations = citations.len(), "Report written");

        Ok(Synthesis {
            executive_summary,
            content: body,
            citations,
        })
    }

    /// One citation per source, numbered as in the prompt
    pub fn citations(content: &[RefinedContent]) -> Vec<Citation> {
        content
            .iter()
            .enumerate()
            .map(|(i, c)| Citation {
                index: i + 1,
                title: c.title.clone(),
                url: c.url.clone(),
            })
            .collect()
    }

    fn with_source_list(body: String, citations: &[Citation]) -> String {
        let lower = body.to_lowercase();
        if citations.is_empty() || lower.contains("## sources") || lower.contains("## references") {
            return body;
        }
        let list = citations
            .iter()
            .map(|c| format!("[{}] {} - {}", c.index, c.title, c.url))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\n## Sources\n\n{}", body, list)
    }

    fn first_paragraph(text: &str) -> String {
        let paragraph = text
            .split("\n\n")
            .map(str::trim)
            .find(|p| !p.is_empty() && !p.starts_with('#'))
            .unwrap_or("");
        truncate_chars(paragraph, SUMMARY_FALLBACK_CHARS).to_string()
    }
}
