use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{read_error, Embeddings};
use crate::llm::google::{model_path, GeminiContent, GeminiPart, GEMINI_API_BASE};
use crate::types::{AppError, AppResult};

/// `batchEmbedContents` accepts at most 100 requests.
const MAX_BATCH: usize = 100;

pub struct GoogleEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

#[derive(Serialize)]
struct EmbedContentRequest {
    /// Fully qualified, `models/...`
    model: String,
    content: GeminiContent,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

impl GoogleEmbeddings {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::new_with_api_base(api_key, model, GEMINI_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, model: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn embed_request(&self, text: &str) -> EmbedContentRequest {
        EmbedContentRequest {
            model: format!("models/{}", model_path(&self.model)),
            content: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: text.to_string() }],
            },
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, model_path(&self.model), method)
    }
}

#[async_trait]
impl Embeddings for GoogleEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH) {
            let body = BatchEmbedRequest {
                requests: chunk.iter().map(|t| self.embed_request(t)).collect(),
            };
            let response = self
                .client
                .post(self.url("batchEmbedContents"))
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| AppError::Embedding(e.to_string()))?;
            if !response.status().is_success() {
                return Err(read_error("Google", response).await);
            }
            let parsed: BatchEmbedResponse = response
                .json()
                .await
                .map_err(|e| AppError::Embedding(format!("Invalid embeddings response: {}", e)))?;
            if parsed.embeddings.len() != chunk.len() {
                return Err(AppError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    chunk.len(),
                    parsed.embeddings.len()
                )));
            }
            vectors.extend(parsed.embeddings.into_iter().map(|e| e.values));
        }
        debug!(count = vectors.len(), model = %self.model, "Documents embedded");
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let response = self
            .client
            .post(self.url("embedContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&self.embed_request(text))
            .send()
            .await
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        if !response.status().is_success() {
            return Err(read_error("Google", response).await);
        }
        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Invalid embeddings response: {}", e)))?;
        Ok(parsed.embedding.values)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn test_embed_documents() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/models/embedding-001:batchEmbedContents")
            .match_header("x-goog-api-key", "g-key")
            .match_body(Matcher::PartialJson(json!({
                "requests": [
                    {"model": "models/embedding-001", "content": {"parts": [{"text": "first"}]}},
                    {"model": "models/embedding-001", "content": {"parts": [{"text": "second"}]}}
                ]
            })))
            .with_status(200)
            .with_body(r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#)
            .create_async()
            .await;

        let embeddings = GoogleEmbeddings::new_with_api_base("g-key", "models/embedding-001", &server.url());
        let vectors = embeddings
            .embed_documents(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn test_embed_query_and_error() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("POST", "/models/embedding-001:embedContent")
            .match_body(Matcher::PartialJson(json!({"content": {"parts": [{"text": "query"}]}})))
            .with_status(200)
            .with_body(r#"{"embedding":{"values":[1.0,0.5]}}"#)
            .create_async()
            .await;
        let _bad = server
            .mock("POST", "/models/embedding-001:embedContent")
            .match_body(Matcher::PartialJson(json!({"content": {"parts": [{"text": "bad"}]}})))
            .with_status(400)
            .with_body(r#"{"error":{"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let embeddings = GoogleEmbeddings::new_with_api_base("g-key", "embedding-001", &server.url());
        assert_eq!(embeddings.embed_query("query").await.unwrap(), vec![1.0, 0.5]);
        let err = embeddings.embed_query("bad").await.unwrap_err();
        assert!(matches!(err, AppError::Embedding(msg) if msg.contains("API key not valid")));
    }
}
