use async_trait::async_trait;
use futures::stream::BoxStream;
use tracing::{info, warn};

use crate::config::LLMConfig;
use crate::llm::fallback::FallbackLLM;
use crate::types::{AppError, AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Stream of text deltas. Adapters without native streaming yield the whole
    /// completion as a single item.
    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let response = self.create_chat_completion(request).await?;
        Ok(Box::pin(futures::stream::once(async move { Ok::<String, AppError>(response.content) })))
    }
}

/// Build the adapter for a single vendor.
pub fn build_adapter(
    provider: LLMProvider,
    api_key: &str,
    base_url: Option<&str>,
) -> Box<dyn LLMAdapter> {
    match (provider, base_url) {
        (LLMProvider::OpenAI, Some(base)) => {
            Box::new(crate::llm::openai::OpenAIAdapter::new_with_api_base(api_key, base))
        }
        (LLMProvider::OpenAI, None) => Box::new(crate::llm::openai::OpenAIAdapter::new(api_key)),
        (LLMProvider::Google, Some(base)) => {
            Box::new(crate::llm::google::GoogleAdapter::new_with_api_base(api_key, base))
        }
        (LLMProvider::Google, None) => Box::new(crate::llm::google::GoogleAdapter::new(api_key)),
    }
}

fn base_url_for(config: &LLMConfig, provider: LLMProvider) -> Option<&str> {
    match provider {
        LLMProvider::OpenAI => config.openai_base_url.as_deref(),
        LLMProvider::Google => config.gemini_base_url.as_deref(),
    }
}

/// Build the primary adapter and, when configured and keyed, the fallback vendor.
pub fn build_llm(config: &LLMConfig) -> AppResult<FallbackLLM> {
    let primary_key = config.api_key_for(config.provider).ok_or_else(|| {
        AppError::Config(format!("No API key configured for LLM provider {}", config.provider))
    })?;
    let primary = build_adapter(
        config.provider,
        &primary_key,
        base_url_for(config, config.provider),
    );
    let mut llm = FallbackLLM::new(primary, config.provider.to_string());

    match config.fallback_provider {
        Some(fallback) if fallback == config.provider => {
            warn!(provider = %fallback, "Fallback provider equals primary provider, fallback disabled");
        }
        Some(fallback) => match config.api_key_for(fallback) {
            Some(key) => {
                let adapter = build_adapter(fallback, &key, base_url_for(config, fallback));
                llm = llm.with_fallback(adapter, fallback.to_string(), config.fallback_llm_model.clone());
                info!(
                    primary = %config.provider,
                    fallback = %fallback,
                    fallback_model = %config.fallback_llm_model,
                    "LLM fallback enabled"
                );
            }
            None => warn!(provider = %fallback, "No API key for fallback provider, fallback disabled"),
        },
        None => info!(primary = %config.provider, "LLM fallback disabled"),
    }

    Ok(llm)
}
