//! Search Agent
//!
//! One query in, summarized sources out: fetch the results page, pick
//! candidate URLs, scrape each page and summarize it against the research
//! question. A page that fails to scrape or summarize is skipped; only a
//! failure to fetch the results page fails the query.

use crate::agents::prompts;
use crate::events::{RunContext, ToolKind};
use crate::llm::LLM;
use crate::models::RefinedContent;
use crate::search::{extract_candidate_urls, BrowserService, FetchOptions, UrlCandidate};
use crate::types::AppResult;
use crate::utils::truncate_chars;
use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Page text handed to the summarizer is cut to this many characters
const MAX_PAGE_CHARS: usize = 25_000;

#[derive(Debug, Clone)]
pub struct SearchOptions<'a> {
    /// Pages scraped for the query
    pub max_results: usize,
    pub timeout: Duration,
    /// URLs already collected this run
    pub scraped_urls: &'a HashSet<String>,
    /// Token budget for each page summary
    pub summary_tokens: u32,
}

pub struct SearchAgent;

impl SearchAgent {
    pub async fn search_and_summarize(
        ctx: &RunContext,
        llm: &LLM,
        browser: &dyn BrowserService,
        query: &str,
        options: SearchOptions<'_>,
    ) -> AppResult<Vec<RefinedContent>> {
        let fetch = FetchOptions {
            timeout: options.timeout,
        };

        let call_id = ctx.tool_call(ToolKind::Search, query);
        let results_page = match browser.search(query, &fetch).await {
            Ok(page) => page,
            Err(e) => {
                ctx.tool_result(call_id, ToolKind::Search, false, e.to_string());
                return Err(e.into());
            }
        };

        let candidates =
            extract_candidate_urls(&results_page, options.max_results, options.scraped_urls);
        ctx.tool_result(
            call_id,
            ToolKind::Search,
            true,
            format!("{} candidate URLs", candidates.len()),
        );
        info!(query = %query, candidates = candidates.len(), "Search results fetched");

        let mut content = Vec::new();
        for candidate in candidates {
            let item = Self::scrape_and_summarize(
                ctx,
                llm,
                browser,
                query,
                &candidate,
                &fetch,
                options.summary_tokens,
            )
            .await;
            if let Some(item) = item {
                content.push(item);
            }
        }

        info!(query = %query, sources = content.len(), "Query summarized");
        Ok(content)
    }

    async fn scrape_and_summarize(
        ctx: &RunContext,
        llm: &LLM,
        browser: &dyn BrowserService,
        query: &str,
        candidate: &UrlCandidate,
        fetch: &FetchOptions,
        summary_tokens: u32,
    ) -> Option<RefinedContent> {
        let url = candidate.url.as_str();

        let call_id = ctx.tool_call(ToolKind::Scrape, url);
        let page = match browser.scrape(url, fetch).await {
            Ok(page) if !page.markdown.trim().is_empty() => page,
            Ok(_) => {
                ctx.tool_result(call_id, ToolKind::Scrape, false, "empty page");
                debug!(url = %url, "Skipping empty page");
                return None;
            }
            Err(e) => {
                ctx.tool_result(call_id, ToolKind::Scrape, false, e.to_string());
                warn!(url = %url, error = %e, "Scrape failed, skipping page");
                return None;
            }
        };
        let raw_length = page.markdown.chars().count();
        ctx.tool_result(call_id, ToolKind::Scrape, true, format!("{} chars", raw_length));

        let title = page
            .title
            .clone()
            .or_else(|| candidate.title.clone())
            .unwrap_or_else(|| url.to_string());

        let call_id = ctx.tool_call(ToolKind::Summarize, url);
        let request = llm
            .request(
                prompts::SUMMARIZER_SYSTEM,
                prompts::summary_prompt(
                    query,
                    &title,
                    url,
                    truncate_chars(&page.markdown, MAX_PAGE_CHARS),
                ),
            )
            .with_max_tokens(summary_tokens);

        let summary = match llm.generate_text(&request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                ctx.tool_result(call_id, ToolKind::Summarize, false, "empty summary");
                warn!(url = %url, "Summarizer returned nothing, skipping page");
                return None;
            }
            Err(e) => {
                ctx.tool_result(call_id, ToolKind::Summarize, false, e.to_string());
                warn!(url = %url, error = %e, "Summarization failed, skipping page");
                return None;
            }
        };
        ctx.tool_result(call_id, ToolKind::Summarize, true, format!("{} chars", summary.len()));

        Some(RefinedContent {
            title,
            url: url.to_string(),
            summary,
            raw_length,
            scraped_at: Utc::now(),
        })
    }
}
