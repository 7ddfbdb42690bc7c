//! SerpApi client
//!
//! Google web results through serpapi.com. The response is walked as loose
//! JSON since SerpApi adds and drops optional fields per result.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::{ensure_success, http_client, request_failed, require_key, Retriever, SearchError, SearchResult};

const SERPAPI_BASE: &str = "https://serpapi.com";

pub struct SerpApiSearch {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl SerpApiSearch {
    pub fn new(api_key: &str) -> Result<Self, SearchError> {
        Self::new_with_api_base(api_key, SERPAPI_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(None)?,
            api_key: require_key("SerpApi", api_key)?,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Retriever for SerpApiSearch {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, "Searching Google via SerpApi");

        let num = max_results.to_string();
        let response = self
            .client
            .get(format!("{}/search.json", self.api_base))
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("hl", "en"),
                ("num", num.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_failed("SerpApi", e))?;
        let results: Value = ensure_success("SerpApi", response)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        debug!("Raw SerpApi response received");

        if let Some(error) = results.get("error").and_then(|v| v.as_str()) {
            // "Google hasn't returned any results for this query." is not a failure
            if error.contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            return Err(SearchError::RequestFailed(error.to_string()));
        }

        let organic_results = match results.get("organic_results") {
            Some(organic) => organic
                .as_array()
                .ok_or_else(|| SearchError::ParseError("Expected array of results".to_string()))?,
            None => return Ok(Vec::new()),
        };

        let mut hits = Vec::new();
        for result in organic_results.iter() {
            let Some(link) = result.get("link").and_then(|v| v.as_str()) else {
                continue;
            };
            let title = result
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Untitled")
                .to_string();
            let snippet = result
                .get("snippet")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            hits.push(SearchResult {
                title,
                href: link.to_string(),
                body: snippet,
            });
            if hits.len() == max_results {
                break;
            }
        }

        info!(count = hits.len(), "SerpApi search completed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_serpapi_search() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/search.json")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("engine".into(), "google".into()),
                Matcher::UrlEncoded("q".into(), "crispr".into()),
                Matcher::UrlEncoded("api_key".into(), "serp-key".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"search_metadata":{"status":"Success"},"organic_results":[
                    {"position":1,"title":"CRISPR","link":"https://en.wikipedia.org/wiki/CRISPR","snippet":"CRISPR is a family of DNA sequences"},
                    {"position":2,"title":"No link"},
                    {"position":3,"link":"https://www.broadinstitute.org/crispr"}
                ]}"#,
            )
            .create_async()
            .await;

        let serpapi = SerpApiSearch::new_with_api_base("serp-key", &server.url()).unwrap();
        let results = serpapi.search("crispr", 5).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].body, "CRISPR is a family of DNA sequences");
        assert_eq!(results[1].title, "Untitled");
        assert_eq!(results[1].body, "");
    }

    #[tokio::test]
    async fn test_serpapi_no_results_and_errors() {
        let mut server = Server::new_async().await;
        let _empty = server
            .mock("GET", "/search.json")
            .match_query(Matcher::UrlEncoded("q".into(), "zzqqxx".into()))
            .with_status(200)
            .with_body(r#"{"error":"Google hasn't returned any results for this query."}"#)
            .create_async()
            .await;
        let _invalid = server
            .mock("GET", "/search.json")
            .match_query(Matcher::UrlEncoded("q".into(), "bad key".into()))
            .with_status(200)
            .with_body(r#"{"error":"Invalid API key."}"#)
            .create_async()
            .await;

        let serpapi = SerpApiSearch::new_with_api_base("serp-key", &server.url()).unwrap();
        assert!(serpapi.search("zzqqxx", 5).await.unwrap().is_empty());
        let err = serpapi.search("bad key", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::RequestFailed(msg) if msg == "Invalid API key."));
    }
}
