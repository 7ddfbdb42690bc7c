use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::{ensure_success, http_client, request_failed, Retriever, SearchError, SearchResult};

/// Self-hosted SearxNG instance; the JSON output format must be enabled.
pub struct SearxSearch {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl SearxSearch {
    pub fn new(base_url: &str) -> Result<Self, SearchError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(SearchError::NoApiKey("Searx URL"));
        }
        url::Url::parse(base_url)
            .map_err(|e| SearchError::RequestFailed(format!("Invalid Searx URL {}: {}", base_url, e)))?;
        Ok(Self {
            client: http_client(None)?,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl Retriever for SearxSearch {
    fn name(&self) -> &'static str {
        "searx"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, instance = %self.base_url, "Searching Searx");

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| request_failed("Searx", e))?;
        let parsed: SearxResponse = ensure_success("Searx", response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r.title,
                href: r.url,
                body: r.content,
            })
            .collect())
    }
}
