use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use gpt_researcher::agents::ResearchServices;
use gpt_researcher::llm::{CompletionClient, LLMAdapter};
use gpt_researcher::retrievers::{Retriever, SearchError, SearchResult};
use gpt_researcher::scraping::{PageFetcher, ScrapedPage};
use gpt_researcher::types::{AppResult, LLMRequest, LLMResponse, TokenUsage};
use gpt_researcher::utils::RetryPolicy;
use gpt_researcher::{create_router, AppState, Config};

struct FixtureLLM;

#[async_trait]
impl LLMAdapter for FixtureLLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let user = request.messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        let content = if user.starts_with("task:") {
            r#"{"server": "🌍 Travel Agent", "agent_role_prompt": "You are a tour guide."}"#.to_string()
        } else if user.contains("google search queries") {
            r#"["lisbon sights"]"#.to_string()
        } else if user.contains("Using the above text, summarize") {
            "Lisbon has trams.".to_string()
        } else {
            "# Lisbon\nVisit Belém.\n".to_string()
        };
        Ok(LLMResponse {
            content,
            finish_reason: "stop".to_string(),
            usage: TokenUsage::default(),
        })
    }
}

struct FixtureRetriever;

#[async_trait]
impl Retriever for FixtureRetriever {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        Ok(vec![SearchResult {
            title: "Visit Lisbon".to_string(),
            href: "https://www.visitlisboa.com".to_string(),
            body: "Official tourism site".to_string(),
        }])
    }
}

struct FixtureFetcher;

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> AppResult<ScrapedPage> {
        Ok(ScrapedPage {
            url: url.to_string(),
            title: "Visit Lisboa".to_string(),
            text: "Lisbon is the capital of Portugal.".to_string(),
        })
    }
}

fn app() -> axum::Router {
    let config = Config::from_vars(&HashMap::new()).unwrap();
    let services = ResearchServices {
        config,
        completion: CompletionClient::new(Arc::new(FixtureLLM), RetryPolicy::new(1, Duration::ZERO)),
        retriever: Arc::new(FixtureRetriever),
        fetcher: Arc::new(FixtureFetcher),
        memory: None,
    };
    create_router(AppState::new(services))
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_provider_and_retriever() {
    let (status, body) = send(Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["llm_provider"], "google");
    assert_eq!(body["retriever"], "fixture");
}

#[tokio::test]
async fn agent_endpoint_returns_profile() {
    let (status, body) = send(post_json("/api/agent", json!({"task": "what to see in Lisbon?"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"server": "🌍 Travel Agent", "agent_role_prompt": "You are a tour guide."}));
}

#[tokio::test]
async fn agent_endpoint_rejects_empty_task() {
    let (status, body) = send(post_json("/api/agent", json!({"task": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("task cannot be empty"));
}

#[tokio::test]
async fn research_endpoint_runs_pipeline() {
    let (status, body) = send(post_json(
        "/api/research",
        json!({"task": "what to see in Lisbon?", "report_type": "research_report"}),
    ))
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"]["server"], "🌍 Travel Agent");
    assert_eq!(body["report"], "# Lisbon\nVisit Belém.\n");
    assert_eq!(body["sources"][0]["href"], "https://www.visitlisboa.com");
    assert_eq!(body["sources"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn embeddings_without_key_is_a_server_error() {
    let (status, body) = send(post_json("/api/embeddings", json!({"texts": ["hello"]}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Embeddings are not configured"));
}
