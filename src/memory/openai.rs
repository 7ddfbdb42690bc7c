use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{read_error, Embeddings};
use crate::llm::openai::OPENAI_API_BASE;
use crate::types::{AppError, AppResult};

pub struct OpenAIEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbeddings {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::new_with_api_base(api_key, model, OPENAI_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, model: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Embeddings for OpenAIEmbeddings {
    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": texts }))
            .send()
            .await
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        if !response.status().is_success() {
            return Err(read_error("OpenAI", response).await);
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Invalid embeddings response: {}", e)))?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| AppError::Embedding("Empty embeddings response".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
