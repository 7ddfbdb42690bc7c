use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{ensure_success, http_client, request_failed, require_key, Retriever, SearchError, SearchResult};

const TAVILY_API_BASE: &str = "https://api.tavily.com";

pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(api_key: &str) -> Result<Self, SearchError> {
        Self::new_with_api_base(api_key, TAVILY_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(None)?,
            api_key: require_key("Tavily", api_key)?,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Retriever for TavilySearch {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, max_results, "Searching Tavily");

        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "search_depth": "basic",
            "max_results": max_results,
            "include_answer": false,
        });
        let response = self
            .client
            .post(format!("{}/search", self.api_base))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_failed("Tavily", e))?;
        let response = ensure_success("Tavily", response).await?;

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        let results: Vec<SearchResult> = parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchResult {
                title: r.title,
                href: r.url,
                body: r.content,
            })
            .collect();
        debug!(count = results.len(), "Tavily results parsed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_tavily_search() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/search")
            .match_body(Matcher::PartialJson(json!({"api_key": "tvly-key", "query": "rust async"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"query":"rust async","results":[
                    {"title":"Async Book","url":"https://rust-lang.github.io/async-book/","content":"Asynchronous Programming in Rust","score":0.9},
                    {"title":"Tokio","url":"https://tokio.rs","content":"An asynchronous runtime","score":0.8},
                    {"title":"Extra","url":"https://example.com","content":"ignored","score":0.1}
                ]}"#,
            )
            .create_async()
            .await;

        let tavily = TavilySearch::new_with_api_base("tvly-key", &server.url()).unwrap();
        let results = tavily.search("rust async", 2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].href, "https://rust-lang.github.io/async-book/");
        assert_eq!(results[1].body, "An asynchronous runtime");
    }

    #[tokio::test]
    async fn test_tavily_empty_and_error() {
        let mut server = Server::new_async().await;
        let _empty = server
            .mock("POST", "/search")
            .match_body(Matcher::PartialJson(json!({"query": "nothing"})))
            .with_status(200)
            .with_body(r#"{"results":[]}"#)
            .create_async()
            .await;
        let _denied = server
            .mock("POST", "/search")
            .match_body(Matcher::PartialJson(json!({"query": "denied"})))
            .with_status(401)
            .with_body(r#"{"detail":{"error":"Unauthorized"}}"#)
            .create_async()
            .await;

        let tavily = TavilySearch::new_with_api_base("tvly-key", &server.url()).unwrap();
        assert!(tavily.search("nothing", 5).await.unwrap().is_empty());
        let err = tavily.search("denied", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::RequestFailed(msg) if msg.contains("401")));
    }

    #[test]
    fn test_tavily_requires_key() {
        assert!(matches!(TavilySearch::new(" "), Err(SearchError::NoApiKey("Tavily"))));
    }
}
