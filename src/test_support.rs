//! Scripted collaborators for tests
//!
//! [`ScriptedLLM`] answers every request through a closure and records what
//! it was asked. [`FakeBrowser`] serves canned search-result pages and
//! articles. Both are available to integration tests through the
//! `test-support` feature.

use crate::llm::{LLMAdapter, LLM};
use crate::search::{BrowserService, FetchOptions, ScrapedPage, SearchError};
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, TokenUsage};
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&LLMRequest) -> AppResult<String> + Send + Sync;

/// LLM whose answers come from a closure
#[derive(Clone)]
pub struct ScriptedLLM {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<LLMRequest>>>,
    stream_chunks: Option<Vec<String>>,
}

impl ScriptedLLM {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&LLMRequest) -> String + Send + Sync + 'static,
    {
        Self::with_results(move |request| Ok(respond(request)))
    }

    /// Responder that may fail individual calls
    pub fn with_results<F>(respond: F) -> Self
    where
        F: Fn(&LLMRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(respond),
            calls: Arc::new(Mutex::new(Vec::new())),
            stream_chunks: None,
        }
    }

    /// Every call fails with an LLM API error
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::with_results(move |_| Err(AppError::LLMApi(message.clone())))
    }

    /// Serve streaming requests as these chunks
    pub fn with_stream_chunks(mut self, chunks: Vec<&str>) -> Self {
        self.stream_chunks = Some(chunks.into_iter().map(String::from).collect());
        self
    }

    pub fn llm(&self) -> LLM {
        LLM::from_adapter(Box::new(self.clone()), "scripted-model")
    }

    /// Requests received so far, in order
    pub fn calls(&self) -> Vec<LLMRequest> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Requests whose system instruction is `system`
    pub fn calls_with_system(&self, system: &str) -> Vec<LLMRequest> {
        self.calls()
            .into_iter()
            .filter(|r| r.system_instruction.as_deref() == Some(system))
            .collect()
    }

    fn record(&self, request: &LLMRequest) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
    }
}

#[async_trait]
impl LLMAdapter for ScriptedLLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.record(request);
        let content = (self.responder)(request)?;
        Ok(LLMResponse {
            content,
            finish_reason: "stop".to_string(),
            usage: TokenUsage::default(),
        })
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        match &self.stream_chunks {
            Some(chunks) => {
                self.record(request);
                let items: Vec<AppResult<String>> = chunks.iter().cloned().map(Ok).collect();
                Ok(stream::iter(items).boxed())
            }
            None => Err(AppError::LLMApi("Streaming not supported by this provider".to_string())),
        }
    }
}

type SearchFallback = dyn Fn(&str) -> ScrapedPage + Send + Sync;

/// Browser service serving canned pages
#[derive(Default)]
pub struct FakeBrowser {
    results: HashMap<String, ScrapedPage>,
    pages: HashMap<String, ScrapedPage>,
    failing_queries: HashSet<String>,
    failing_pages: HashSet<String>,
    search_fallback: Option<Box<SearchFallback>>,
    searches: Mutex<Vec<String>>,
    scrapes: Mutex<Vec<String>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markdown results page linking to `links` as `(title, url)`
    pub fn results_page(query: &str, links: &[(&str, &str)]) -> ScrapedPage {
        let markdown = links
            .iter()
            .map(|(title, url)| format!("[{}]({})", title, url))
            .collect::<Vec<_>>()
            .join("\n");
        ScrapedPage {
            url: format!("https://www.google.com/search?q={}", query.replace(' ', "+")),
            title: Some(format!("{} - Google Search", query)),
            markdown,
            html: None,
        }
    }

    pub fn with_results(mut self, query: &str, links: &[(&str, &str)]) -> Self {
        self.results
            .insert(query.to_string(), Self::results_page(query, links));
        self
    }

    pub fn with_page(mut self, url: &str, title: &str, markdown: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            ScrapedPage {
                url: url.to_string(),
                title: Some(title.to_string()),
                markdown: markdown.to_string(),
                html: None,
            },
        );
        self
    }

    /// Results page for any query without canned results
    pub fn with_search_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&str) -> ScrapedPage + Send + Sync + 'static,
    {
        self.search_fallback = Some(Box::new(fallback));
        self
    }

    pub fn failing_query(mut self, query: &str) -> Self {
        self.failing_queries.insert(query.to_string());
        self
    }

    pub fn failing_page(mut self, url: &str) -> Self {
        self.failing_pages.insert(url.to_string());
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn scrapes(&self) -> Vec<String> {
        self.scrapes.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl BrowserService for FakeBrowser {
    async fn search(
        &self,
        query: &str,
        _options: &FetchOptions,
    ) -> Result<ScrapedPage, SearchError> {
        if let Ok(mut searches) = self.searches.lock() {
            searches.push(query.to_string());
        }
        if self.failing_queries.contains(query) {
            return Err(SearchError::Api {
                status: 503,
                message: format!("search unavailable for {}", query),
            });
        }
        if let Some(page) = self.results.get(query) {
            return Ok(page.clone());
        }
        match &self.search_fallback {
            Some(fallback) => Ok(fallback(query)),
            None => Err(SearchError::EmptyContent(query.to_string())),
        }
    }

    async fn scrape(&self, url: &str, _options: &FetchOptions) -> Result<ScrapedPage, SearchError> {
        if let Ok(mut scrapes) = self.scrapes.lock() {
            scrapes.push(url.to_string());
        }
        if self.failing_pages.contains(url) {
            return Err(SearchError::RequestFailed(format!("connection reset by {}", url)));
        }
        Ok(self.pages.get(url).cloned().unwrap_or_else(|| ScrapedPage {
            url: url.to_string(),
            title: Some(format!("Page at {}", url)),
            markdown: format!("Content served from {}", url),
            html: None,
        }))
    }
}
