//! Search Module
//!
//! Web access for the researcher goes through the [`BrowserService`] trait:
//! - `search`: fetch a search-engine results page for a query
//! - `scrape`: fetch one page as readable markdown
//!
//! [`SteelClient`] implements it on top of Steel's hosted scrape API.

pub mod steel;
pub mod urls;

pub use steel::SteelClient;
pub use urls::{extract_candidate_urls, is_excluded_domain, UrlCandidate};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the browser service
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Steel API key not configured")]
    NoApiKey,

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Browser service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse scrape response: {0}")]
    ParseError(String),

    #[error("No content returned for {0}")]
    EmptyContent(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl SearchError {
    /// Transport failures, rate limits and server errors are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::RequestFailed(_) => true,
            SearchError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A fetched page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedPage {
    pub url: String,
    pub title: Option<String>,
    pub markdown: String,
    pub html: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

#[async_trait]
pub trait BrowserService: Send + Sync {
    /// Results page for `query`
    async fn search(&self, query: &str, options: &FetchOptions) -> Result<ScrapedPage, SearchError>;

    /// Readable content of `url`
    async fn scrape(&self, url: &str, options: &FetchOptions) -> Result<ScrapedPage, SearchError>;
}
