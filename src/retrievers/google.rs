use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{ensure_success, http_client, request_failed, require_key, Retriever, SearchError, SearchResult};

const GOOGLE_CSE_BASE: &str = "https://www.googleapis.com";
/// The Custom Search API caps `num` at 10.
const MAX_PAGE_SIZE: usize = 10;

/// Google Programmable Search (Custom Search JSON API).
pub struct GoogleSearch {
    client: reqwest::Client,
    api_key: String,
    cx_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct CseResponse {
    /// Absent when the query has no results.
    #[serde(default)]
    items: Vec<CseItem>,
}

#[derive(Debug, Deserialize)]
struct CseItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

impl GoogleSearch {
    pub fn new(api_key: &str, cx_key: &str) -> Result<Self, SearchError> {
        Self::new_with_api_base(api_key, cx_key, GOOGLE_CSE_BASE)
    }

    pub fn new_with_api_base(api_key: &str, cx_key: &str, api_base: &str) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(None)?,
            api_key: require_key("Google", api_key)?,
            cx_key: require_key("Google CX", cx_key)?,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Retriever for GoogleSearch {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, "Searching Google");

        let num = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let response = self
            .client
            .get(format!("{}/customsearch/v1", self.api_base))
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx_key.as_str()),
                ("q", query),
                ("start", "1"),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_failed("Google", e))?;
        let parsed: CseResponse = ensure_success("Google", response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        if parsed.items.is_empty() {
            warn!(query = %query, "Google returned no results");
        }

        // Video pages have nothing to scrape.
        Ok(parsed
            .items
            .into_iter()
            .filter(|item| !item.link.contains("youtube.com"))
            .take(max_results)
            .map(|item| SearchResult {
                title: item.title,
                href: item.link,
                body: item.snippet,
            })
            .collect())
    }
}
