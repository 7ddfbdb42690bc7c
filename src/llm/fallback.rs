//! Provider fallback.
//!
//! The primary vendor is always asked first. When it refuses the prompt
//! (content block) or fails, the same messages are re-issued to the secondary
//! vendor with the secondary's own model name.

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tracing::{info, warn};

use crate::llm::provider::LLMAdapter;
use crate::types::{AppError, AppResult, LLMRequest, LLMResponse};

struct Secondary {
    adapter: Box<dyn LLMAdapter>,
    name: String,
    model: String,
}

impl Secondary {
    fn request_for(&self, request: &LLMRequest) -> LLMRequest {
        LLMRequest {
            model: self.model.clone(),
            ..request.clone()
        }
    }
}

pub struct FallbackLLM {
    primary: Box<dyn LLMAdapter>,
    primary_name: String,
    secondary: Option<Secondary>,
}

impl FallbackLLM {
    pub fn new(primary: Box<dyn LLMAdapter>, primary_name: impl Into<String>) -> Self {
        Self {
            primary,
            primary_name: primary_name.into(),
            secondary: None,
        }
    }

    pub fn with_fallback(
        mut self,
        adapter: Box<dyn LLMAdapter>,
        name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.secondary = Some(Secondary {
            adapter,
            name: name.into(),
            model: model.into(),
        });
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.secondary.is_some()
    }

    fn log_switch(&self, secondary: &Secondary, error: &AppError) {
        if error.is_content_blocked() {
            info!(
                primary = %self.primary_name,
                fallback = %secondary.name,
                reason = %error,
                "Primary provider blocked the prompt, switching to fallback provider"
            );
        } else {
            warn!(
                primary = %self.primary_name,
                fallback = %secondary.name,
                error = %error,
                "Primary provider failed, trying fallback provider"
            );
        }
    }

    /// Open the primary stream and pull its first item, so a block reported
    /// up front can still be redirected before anything reaches the caller.
    async fn open_primary_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let mut stream = self.primary.create_chat_completion_stream(request).await?;
        match stream.next().await {
            Some(Ok(first)) => Ok(Box::pin(
                stream::once(async move { Ok::<String, AppError>(first) }).chain(stream),
            )),
            Some(Err(e)) => Err(e),
            None => Ok(Box::pin(stream::empty::<AppResult<String>>())),
        }
    }
}

#[async_trait]
impl LLMAdapter for FallbackLLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        match self.primary.create_chat_completion(request).await {
            Ok(response) => Ok(response),
            Err(error) => match &self.secondary {
                Some(secondary) => {
                    self.log_switch(secondary, &error);
                    secondary
                        .adapter
                        .create_chat_completion(&secondary.request_for(request))
                        .await
                }
                None => Err(error),
            },
        }
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        match self.open_primary_stream(request).await {
            Ok(stream) => Ok(stream),
            Err(error) => match &self.secondary {
                Some(secondary) => {
                    self.log_switch(secondary, &error);
                    secondary
                        .adapter
                        .create_chat_completion_stream(&secondary.request_for(request))
                        .await
                }
                None => Err(error),
            },
        }
    }
}
