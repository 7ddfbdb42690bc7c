// Google Gemini adapter
// API Reference: https://ai.google.dev/api/generate-content
//
// Gemini has no system role and names the assistant "model", so OpenAI-style
// messages are translated before every call (see `to_gemini_contents`).

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::provider::LLMAdapter;
use crate::llm::sse;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse, TokenUsage};

pub(crate) const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Every harm category is unblocked; refusals surface as `promptFeedback.blockReason`.
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GoogleAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    safety_settings: Vec<GeminiSafetySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize)]
struct GeminiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect::<String>())
            .unwrap_or_default()
    }

    /// Block signal: explicit prompt feedback, or a safety stop with no text.
    fn block_reason(&self) -> Option<String> {
        if let Some(reason) = self.prompt_feedback.as_ref().and_then(|f| f.block_reason.clone()) {
            return Some(reason);
        }
        let candidate = self.candidates.first()?;
        match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT")) if self.text().is_empty() => {
                Some(reason.to_string())
            }
            _ => None,
        }
    }
}

/// Translate chat messages into Gemini contents.
///
/// All system and user messages are merged, in order, into the parts of a
/// single leading `user` content; every other message becomes its own
/// `model` content.
pub(crate) fn to_gemini_contents(messages: &[LLMMessage]) -> Vec<GeminiContent> {
    let mut prompt = GeminiContent {
        role: Some("user".to_string()),
        parts: Vec::new(),
    };
    let mut replies = Vec::new();

    for message in messages {
        let part = GeminiPart {
            text: message.content.clone(),
        };
        match message.role.as_str() {
            "system" | "user" => prompt.parts.push(part),
            _ => replies.push(GeminiContent {
                role: Some("model".to_string()),
                parts: vec![part],
            }),
        }
    }

    let mut contents = Vec::with_capacity(replies.len() + 1);
    if !prompt.parts.is_empty() {
        contents.push(prompt);
    }
    contents.extend(replies);
    contents
}

pub(crate) fn model_path(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

impl GoogleAdapter {
    pub fn new(api_key: &str) -> Self {
        Self::new_with_api_base(api_key, GEMINI_API_BASE)
    }

    pub fn new_with_api_base(api_key: &str, api_base: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn build_request(request: &LLMRequest) -> GeminiRequest {
        let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        GeminiRequest {
            contents: to_gemini_contents(&request.messages),
            safety_settings: HARM_CATEGORIES
                .into_iter()
                .map(|category| GeminiSafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
            generation_config,
        }
    }

    async fn send(&self, request: &LLMRequest, stream: bool) -> AppResult<reqwest::Response> {
        let method = if stream { "streamGenerateContent" } else { "generateContent" };
        let url = format!("{}/models/{}:{}", self.api_base, model_path(&request.model), method);

        let mut builder = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(request));
        if stream {
            builder = builder.query(&[("alt", "sse")]);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(AppError::LLMApi(format!(
                    "Gemini API error ({}): {} (status: {})",
                    status,
                    error_response.error.message,
                    error_response.error.status.unwrap_or_default()
                )));
            }
            return Err(AppError::LLMApi(format!("Gemini API error ({}): {}", status, error_text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMAdapter for GoogleAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let response = self.send(request, false).await?;

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("Failed to parse Gemini response: {}", e)))?;

        if let Some(reason) = parsed.block_reason() {
            return Err(AppError::ContentBlocked(format!("Gemini block_reason: {}", reason)));
        }

        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| AppError::LLMApi("Gemini returned no candidates".to_string()))?;
        let finish_reason = candidate.finish_reason.clone().unwrap_or_else(|| "STOP".to_string());

        let usage = parsed
            .usage_metadata
            .as_ref()
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: parsed.text(),
            finish_reason,
            usage,
        })
    }

    async fn create_chat_completion_stream(
        &self,
        request: &LLMRequest,
    ) -> AppResult<BoxStream<'static, AppResult<String>>> {
        let response = self.send(request, true).await?;
        Ok(Box::pin(stream_text(sse::data_lines(response))))
    }
}

fn stream_text(
    events: impl Stream<Item = AppResult<String>> + Send + 'static,
) -> impl Stream<Item = AppResult<String>> + Send + 'static {
    try_stream! {
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            let data = event?;
            let chunk: GeminiResponse = serde_json::from_str(&data)
                .map_err(|e| AppError::LLMApi(format!("Failed to parse Gemini stream chunk: {}", e)))?;
            if let Some(reason) = chunk.block_reason() {
                Err::<(), AppError>(AppError::ContentBlocked(format!("Gemini block_reason: {}", reason)))?;
            }
            let text = chunk.text();
            if !text.is_empty() {
                yield text;
            }
        }
    }
}
