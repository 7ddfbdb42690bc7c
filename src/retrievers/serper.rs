use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ensure_success, http_client, request_failed, require_key, Retriever, SearchError, SearchResult};

const SERPER_API_BASE: &str = "https://google.serper.dev";

/// Google results through serper.dev.
pub struct SerperSearch {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearch {
    pub fn new(api_key: &str) -> Result<Self, SearchError> {
        Self::new_with_api_base(api_key, SERPER_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(None)?,
            api_key: require_key("Serper", api_key)?,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Retriever for SerperSearch {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, "Searching Serper");

        let response = self
            .client
            .post(format!("{}/search", self.api_base))
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": max_results }))
            .send()
            .await
            .map_err(|e| request_failed("Serper", e))?;
        let parsed: SerperResponse = ensure_success("Serper", response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        Ok(parsed
            .organic
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r.title,
                href: r.link,
                body: r.snippet,
            })
            .collect())
    }
}
