// OpenAI chat completions adapter
// API Reference: https://platform.openai.com/docs/api-reference/chat

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::LLMAdapter;
use crate::llm::sse;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse, TokenUsage};

pub(crate) const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Finish reason / error code OpenAI uses when its moderation refuses a prompt.
const CONTENT_FILTER: &str = "content_filter";

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [LLMMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAIAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, OPENAI_API_BASE)
    }

    /// OpenAI-compatible endpoint (proxies, Azure-style gateways, test servers).
    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn send(&self, request: &LLMRequest, stream: bool) -> AppResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.api_base);
        let body = OpenAIChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::error_from_body(status, &error_text));
        }

        Ok(response)
    }

    fn error_from_body(status: reqwest::StatusCode, body: &str) -> AppError {
        match serde_json::from_str::<OpenAIErrorResponse>(body) {
            Ok(parsed) => {
                let code = parsed.error.code.unwrap_or_default();
                if code == CONTENT_FILTER || code == "content_policy_violation" {
                    AppError::ContentBlocked(parsed.error.message)
                } else {
                    AppError::LLMApi(format!(
                        "OpenAI API error ({}): {} (code: {})",
                        status, parsed.error.message, code
                    ))
                }
            }
            Err(_) => AppError::LLMApi(format!("OpenAI API error ({}): {}", status, body)),
        }
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let response = self.send(request, false).await?;

        let parsed: OpenAIChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse OpenAI response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("OpenAI returned no choices".to_string()))?;

        let finish_reason = choice.finish_reason.unwrap_or_else(|| "stop".to_string());
        if finish_reason == CONTENT_FILTER {
            return Err(AppError::ContentBlocked("OpenAI content filter".to_string()));
        }

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            usage,
        })
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let response = self.send(request, true).await?;
        Ok(Box::pin(stream_deltas(sse::data_lines(response))))
    }
}

fn stream_deltas(
    events: impl Stream<Item = AppResult<String>> + Send + 'static,
) -> impl Stream<Item = AppResult<String>> + Send + 'static {
    try_stream! {
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            let data = event?;
            let chunk: OpenAIStreamChunk = match serde_json::from_str(&data) {
                Ok(chunk) => chunk,
                Err(e) => {
                    tracing::warn!(error = %e, data = %data, "Failed to parse OpenAI stream chunk");
                    continue;
                }
            };
            for choice in chunk.choices {
                if choice.finish_reason.as_deref() == Some(CONTENT_FILTER) {
                    Err::<(), AppError>(AppError::ContentBlocked("OpenAI content filter".to_string()))?;
                }
                if let Some(content) = choice.delta.content {
                    if !content.is_empty() {
                        yield content;
                    }
                }
            }
        }
    }
}
