//! Embeddings client factory.
//!
//! `Memory` owns the embeddings client selected by configuration. It is only a
//! handle; there is no vector store behind it.

pub mod google;
pub mod openai;

pub use google::GoogleEmbeddings;
pub use openai::OpenAIEmbeddings;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::EmbeddingConfig;
use crate::types::{AppError, AppResult, LLMProvider};

#[async_trait]
pub trait Embeddings: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_documents(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>>;

    fn model_name(&self) -> &str;
}

#[derive(Clone)]
pub struct Memory {
    embeddings: Arc<dyn Embeddings>,
}

impl Memory {
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        if config.api_key.is_empty() {
            return Err(AppError::Config(format!(
                "No API key configured for {} embeddings",
                config.provider
            )));
        }

        let embeddings: Arc<dyn Embeddings> = match (config.provider, config.base_url.as_deref()) {
            (LLMProvider::Google, Some(base)) => {
                Arc::new(GoogleEmbeddings::new_with_api_base(&config.api_key, &config.model, base))
            }
            (LLMProvider::Google, None) => Arc::new(GoogleEmbeddings::new(&config.api_key, &config.model)),
            (LLMProvider::OpenAI, Some(base)) => {
                Arc::new(OpenAIEmbeddings::new_with_api_base(&config.api_key, &config.model, base))
            }
            (LLMProvider::OpenAI, None) => Arc::new(OpenAIEmbeddings::new(&config.api_key, &config.model)),
        };
        info!(provider = %config.provider, model = %config.model, "Embeddings client ready");

        Ok(Self { embeddings })
    }

    pub fn from_embeddings(embeddings: Arc<dyn Embeddings>) -> Self {
        Self { embeddings }
    }

    pub fn get_embeddings(&self) -> Arc<dyn Embeddings> {
        self.embeddings.clone()
    }
}

pub(crate) async fn read_error(provider: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AppError::Embedding(format!("{} embeddings returned {}: {}", provider, status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: LLMProvider, key: &str, model: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider,
            model: model.to_string(),
            api_key: key.to_string(),
            base_url: None,
        }
    }

    #[test]
    fn test_memory_selects_provider() {
        let memory = Memory::new(&config(LLMProvider::Google, "g", "models/embedding-001")).unwrap();
        assert_eq!(memory.get_embeddings().model_name(), "models/embedding-001");

        let memory = Memory::new(&config(LLMProvider::OpenAI, "o", "text-embedding-3-small")).unwrap();
        assert_eq!(memory.get_embeddings().model_name(), "text-embedding-3-small");
    }

    #[test]
    fn test_memory_requires_key() {
        let err = Memory::new(&config(LLMProvider::Google, "", "models/embedding-001")).err().unwrap();
        assert!(matches!(err, AppError::Config(_)));
    }
}
