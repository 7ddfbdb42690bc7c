//! Retrievers
//!
//! Thin adapters over third-party web-search APIs. Each one turns a query into
//! a provider-neutral list of [`SearchResult`]s:
//!
//! - **Tavily** - search API built for LLM agents (default)
//! - **DuckDuckGo** - HTML endpoint, no API key required
//! - **Google** - Programmable Search (Custom Search JSON API)
//! - **Serper** - Google results via serper.dev
//! - **Searx** - self-hosted SearxNG instance
//! - **SerpApi** - Google results via serpapi.com

pub mod duckduckgo;
pub mod google;
pub mod searx;
pub mod serpapi;
pub mod serper;
pub mod tavily;

pub use duckduckgo::Duckduckgo;
pub use google::GoogleSearch;
pub use searx::SearxSearch;
pub use serpapi::SerpApiSearch;
pub use serper::SerperSearch;
pub use tavily::TavilySearch;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SearchConfig;

/// Errors that can occur during search operations
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("{0} API key not configured")]
    NoApiKey(&'static str),

    #[error("Unknown retriever: {0}")]
    UnknownRetriever(String),

    #[error("Search request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse search results: {0}")]
    ParseError(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// A single hit, independent of the provider that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Target URL
    pub href: String,
    /// Snippet or extracted content
    pub body: String,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError>;
}

pub const RETRIEVER_NAMES: [&str; 6] = ["tavily", "duckduckgo", "google", "serper", "searx", "serpapi"];

/// Build the retriever named by `config.retriever`.
pub fn get_retriever(config: &SearchConfig, user_agent: &str) -> Result<Arc<dyn Retriever>, SearchError> {
    let retriever: Arc<dyn Retriever> = match config.retriever.trim().to_lowercase().as_str() {
        "tavily" => Arc::new(TavilySearch::new(&config.tavily_api_key)?),
        "duckduckgo" | "ddg" => Arc::new(Duckduckgo::new(user_agent)?),
        "google" => Arc::new(GoogleSearch::new(&config.google_api_key, &config.google_cx_key)?),
        "serper" => Arc::new(SerperSearch::new(&config.serper_api_key)?),
        "searx" | "searxng" => Arc::new(SearxSearch::new(&config.searx_url)?),
        "serpapi" => Arc::new(SerpApiSearch::new(&config.serpapi_api_key)?),
        other => return Err(SearchError::UnknownRetriever(other.to_string())),
    };
    tracing::info!(retriever = retriever.name(), "Retriever configured");
    Ok(retriever)
}

pub(crate) fn http_client(user_agent: Option<&str>) -> Result<reqwest::Client, SearchError> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent.to_string());
    }
    builder.build().map_err(|e| SearchError::ClientBuild(e.to_string()))
}

/// Fail on non-2xx, keeping the body for the error message.
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, SearchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SearchError::RequestFailed(format!("{} returned {}: {}", provider, status, body)))
}

pub(crate) fn request_failed(provider: &str, error: reqwest::Error) -> SearchError {
    SearchError::RequestFailed(format!("{} request failed: {}", provider, error))
}

pub(crate) fn require_key(provider: &'static str, key: &str) -> Result<String, SearchError> {
    if key.trim().is_empty() {
        Err(SearchError::NoApiKey(provider))
    } else {
        Ok(key.trim().to_string())
    }
}
