//! Steel Client
//!
//! Fetches pages through Steel's hosted browsers using the scrape endpoint
//! (`POST /v1/scrape`). Searching is scraping the configured results page
//! with the query in its `q` parameter.

use crate::config::SteelConfig;
use crate::search::{BrowserService, FetchOptions, ScrapedPage, SearchError};
use crate::utils::with_retry;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const STEEL_API_BASE: &str = "https://api.steel.dev";
const DEFAULT_SEARCH_URL: &str = "https://www.google.com/search";
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Serialize)]
struct ScrapeRequest<'a> {
    url: &'a str,
    format: &'a [&'a str],
}

/// Steel API client
pub struct SteelClient {
    client: Client,
    api_key: String,
    base_url: String,
    search_url: String,
    retry_attempts: u32,
}

impl SteelClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SearchError::NoApiKey);
        }
        Ok(Self {
            client: Client::new(),
            api_key,
            base_url: STEEL_API_BASE.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            retry_attempts: 3,
        })
    }

    pub fn from_config(config: &SteelConfig) -> Result<Self, SearchError> {
        Ok(Self::new(config.api_key.clone())?
            .with_base_url(&config.base_url)
            .with_search_url(&config.search_url)
            .with_retry_attempts(config.retry_attempts))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_search_url(mut self, search_url: &str) -> Self {
        self.search_url = search_url.to_string();
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Results-page URL for a query
    pub fn search_page_url(&self, query: &str) -> Result<Url, SearchError> {
        Url::parse_with_params(&self.search_url, &[("q", query)])
            .map_err(|e| SearchError::InvalidUrl(format!("{}: {}", self.search_url, e)))
    }

    async fn scrape_with_formats(
        &self,
        url: &str,
        formats: &[&str],
        timeout: Duration,
    ) -> Result<ScrapedPage, SearchError> {
        with_retry(
            || self.scrape_once(url, formats, timeout),
            self.retry_attempts,
            RETRY_BASE_DELAY,
            SearchError::is_retryable,
        )
        .await
    }

    async fn scrape_once(
        &self,
        url: &str,
        formats: &[&str],
        timeout: Duration,
    ) -> Result<ScrapedPage, SearchError> {
        let endpoint = format!("{}/v1/scrape", self.base_url);
        debug!(url = %url, "Scraping via Steel");

        let response = self
            .client
            .post(&endpoint)
            .header("steel-api-key", &self.api_key)
            .timeout(timeout)
            .json(&ScrapeRequest {
                url,
                format: formats,
            })
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        parse_scrape_response(url, &body)
    }
}

/// Pull markdown, html and title out of a scrape response
fn parse_scrape_response(url: &str, body: &Value) -> Result<ScrapedPage, SearchError> {
    let content = body
        .get("content")
        .ok_or_else(|| SearchError::ParseError("missing `content` field".to_string()))?;

    let text_field = |name: &str| {
        content
            .get(name)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
    };

    let html = text_field("html").or_else(|| text_field("cleaned_html"));
    let markdown = text_field("markdown")
        .or_else(|| {
            content
                .get("readability")
                .and_then(|r| r.get("textContent"))
                .and_then(|v| v.as_str())
                .map(String::from)
        })
        .unwrap_or_default();

    if markdown.is_empty() && html.is_none() {
        return Err(SearchError::EmptyContent(url.to_string()));
    }

    let title = body
        .get("metadata")
        .and_then(|m| m.get("title"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Ok(ScrapedPage {
        url: url.to_string(),
        title,
        markdown,
        html,
    })
}

#[async_trait]
impl BrowserService for SteelClient {
    async fn search(
        &self,
        query: &str,
        options: &FetchOptions,
    ) -> Result<ScrapedPage, SearchError> {
        let url = self.search_page_url(query)?;
        info!(query = %query, "Searching via Steel");
        self.scrape_with_formats(url.as_str(), &["markdown", "html"], options.timeout)
            .await
    }

    async fn scrape(&self, url: &str, options: &FetchOptions) -> Result<ScrapedPage, SearchError> {
        self.scrape_with_formats(url, &["markdown"], options.timeout).await
    }
}
