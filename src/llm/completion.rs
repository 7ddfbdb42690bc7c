//! Chat completion entry point used by the agents.
//!
//! Validates the request, retries the vendor call a bounded number of times
//! and, in streaming mode, forwards the report paragraph by paragraph.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, error, warn};

use crate::config::LLMConfig;
use crate::llm::provider::LLMAdapter;
use crate::output::{emit, ConsoleSink, EventSink, OutputEvent};
use crate::types::{AppError, AppResult, LLMRequest};
use crate::utils::retry::{with_retry, RetryPolicy};

/// Upper bound accepted for `max_tokens`.
pub const MAX_TOKENS_LIMIT: u32 = 30_000;

/// Accumulates streamed text and cuts it into newline-terminated paragraphs.
#[derive(Debug, Default)]
pub struct ParagraphBuffer {
    paragraph: String,
    response: String,
}

impl ParagraphBuffer {
    /// Append a delta; returns the pending paragraph once it contains a newline.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        self.response.push_str(delta);
        self.paragraph.push_str(delta);
        if self.paragraph.contains('\n') {
            Some(std::mem::take(&mut self.paragraph))
        } else {
            None
        }
    }

    /// Full response plus the unterminated tail, if any.
    pub fn finish(self) -> (String, Option<String>) {
        let tail = if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        };
        (self.response, tail)
    }
}

#[derive(Clone)]
pub struct CompletionClient {
    llm: Arc<dyn LLMAdapter>,
    retry: RetryPolicy,
}

impl CompletionClient {
    pub fn new(llm: Arc<dyn LLMAdapter>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    pub fn from_config(llm: Arc<dyn LLMAdapter>, config: &LLMConfig) -> Self {
        Self::new(
            llm,
            RetryPolicy::new(config.max_attempts, Duration::from_millis(config.retry_delay_ms)),
        )
    }

    pub fn adapter(&self) -> &Arc<dyn LLMAdapter> {
        &self.llm
    }

    /// Run a completion and return the full text.
    ///
    /// With `stream` set, paragraphs are sent to `sink` as `report` events
    /// (or printed to the console when no sink is given) while generating.
    pub async fn create_chat_completion(
        &self,
        request: &LLMRequest,
        stream: bool,
        sink: Option<&dyn EventSink>,
    ) -> AppResult<String> {
        validate(request)?;

        with_retry(&self.retry, "chat_completion", || {
            self.send_chat_completion_request(request, stream, sink)
        })
        .await
        .map_err(|e| {
            error!(model = %request.model, error = %e, "Failed to get response from LLM API");
            AppError::LLMApi(format!(
                "Failed to get response from LLM API after {} attempts: {}",
                self.retry.max_attempts, e
            ))
        })
    }

    async fn send_chat_completion_request(
        &self,
        request: &LLMRequest,
        stream: bool,
        sink: Option<&dyn EventSink>,
    ) -> AppResult<String> {
        if stream {
            return self.stream_response(request, sink).await;
        }
        let response = self.llm.create_chat_completion(request).await?;
        debug!(
            model = %request.model,
            finish_reason = %response.finish_reason,
            total_tokens = response.usage.total_tokens,
            "Chat completion received"
        );
        Ok(response.content)
    }

    async fn stream_response(
        &self,
        request: &LLMRequest,
        sink: Option<&dyn EventSink>,
    ) -> AppResult<String> {
        let console = ConsoleSink;
        let sink: &dyn EventSink = sink.unwrap_or(&console);

        let mut stream = self.llm.create_chat_completion_stream(request).await?;
        let mut buffer = ParagraphBuffer::default();
        let mut emitted = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) => {
                    if let Some(paragraph) = buffer.push(&delta) {
                        emit(sink, OutputEvent::Report(paragraph)).await;
                        emitted = true;
                    }
                }
                // Nothing reached the client yet, so the whole call can be retried.
                Err(e) if !emitted => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Stream interrupted after partial output, keeping partial response");
                    break;
                }
            }
        }

        let (response, tail) = buffer.finish();
        if let Some(tail) = tail {
            emit(sink, OutputEvent::Report(tail)).await;
        }
        Ok(response)
    }
}

fn validate(request: &LLMRequest) -> AppResult<()> {
    if request.model.trim().is_empty() {
        return Err(AppError::InvalidRequest("Model cannot be empty".to_string()));
    }
    if let Some(max_tokens) = request.max_tokens {
        if max_tokens > MAX_TOKENS_LIMIT {
            return Err(AppError::InvalidRequest(format!(
                "Max tokens cannot be more than {}, but got {}",
                MAX_TOKENS_LIMIT, max_tokens
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fallback::tests::ScriptedAdapter;
    use crate::output::ChannelSink;
    use crate::types::{LLMMessage, LLMResponse};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn request() -> LLMRequest {
        LLMRequest::new("gemini-pro", vec![LLMMessage::user("write")])
    }

    fn client(adapter: impl LLMAdapter + 'static, attempts: u32) -> CompletionClient {
        CompletionClient::new(Arc::new(adapter), RetryPolicy::new(attempts, Duration::ZERO))
    }

    /// Fails `failures` times, then answers.
    struct Flaky {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LLMAdapter for Flaky {
        async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(AppError::LLMApi(format!("overloaded {}", n)));
            }
            Ok(LLMResponse {
                content: "done".to_string(),
                finish_reason: "stop".to_string(),
                usage: Default::default(),
            })
        }
    }

    /// Emits one paragraph and then breaks.
    struct BrokenStream;

    #[async_trait]
    impl LLMAdapter for BrokenStream {
        async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
            Err(AppError::LLMApi("unused".to_string()))
        }

        async fn create_chat_completion_stream(
            &self,
            _request: &LLMRequest,
        ) -> AppResult<BoxStream<'static, AppResult<String>>> {
            Ok(Box::pin(stream::iter(vec![
                Ok("first line\n".to_string()),
                Err(AppError::LLMApi("connection reset".to_string())),
            ])))
        }
    }

    /// First stream breaks before a full paragraph, later ones succeed.
    struct EarlyBreak {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LLMAdapter for EarlyBreak {
        async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
            Err(AppError::LLMApi("unused".to_string()))
        }

        async fn create_chat_completion_stream(
            &self,
            _request: &LLMRequest,
        ) -> AppResult<BoxStream<'static, AppResult<String>>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let items = if n == 1 {
                vec![
                    Ok("partial".to_string()),
                    Err(AppError::LLMApi("connection reset".to_string())),
                ]
            } else {
                vec![Ok("ok\n".to_string())]
            };
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[test]
    fn test_paragraph_buffer() {
        let mut buffer = ParagraphBuffer::default();
        assert_eq!(buffer.push("Hello"), None);
        assert_eq!(buffer.push(" world\nNext"), Some("Hello world\nNext".to_string()));
        assert_eq!(buffer.push(" part"), None);
        let (response, tail) = buffer.finish();
        assert_eq!(response, "Hello world\nNext part");
        assert_eq!(tail.as_deref(), Some(" part"));
    }

    #[tokio::test]
    async fn test_rejects_empty_model() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = client(Flaky { failures: 0, calls: calls.clone() }, 10);
        let err = client
            .create_chat_completion(&LLMRequest::new("", vec![]), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejects_excessive_max_tokens() {
        let client = client(ScriptedAdapter::ok(&["x"]), 10);
        let err = client
            .create_chat_completion(&request().with_max_tokens(30_001), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));

        let ok = client
            .create_chat_completion(&request().with_max_tokens(30_000), false, None)
            .await
            .unwrap();
        assert_eq!(ok, "x");
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = client(Flaky { failures: 3, calls: calls.clone() }, 10);
        let text = client.create_chat_completion(&request(), false, None).await.unwrap();
        assert_eq!(text, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = client(Flaky { failures: 100, calls: calls.clone() }, 10);
        let err = client.create_chat_completion(&request(), false, None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to get response from LLM API"));
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_streaming_emits_paragraphs() {
        let client = client(ScriptedAdapter::ok(&["# Title", "\nBody ", "text\n", "tail"]), 1);
        let (sink, mut rx) = ChannelSink::channel();

        let text = client
            .create_chat_completion(&request(), true, Some(&sink))
            .await
            .unwrap();

        assert_eq!(text, "# Title\nBody text\ntail");
        let mut paragraphs = Vec::new();
        while let Ok(event) = rx.try_recv() {
            paragraphs.push(event);
        }
        assert_eq!(
            paragraphs,
            vec![
                OutputEvent::Report("# Title\nBody ".to_string()),
                OutputEvent::Report("text\n".to_string()),
                OutputEvent::Report("tail".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_error_after_output_keeps_partial() {
        let client = client(BrokenStream, 10);
        let (sink, mut rx) = ChannelSink::channel();
        let text = client
            .create_chat_completion(&request(), true, Some(&sink))
            .await
            .unwrap();
        assert_eq!(text, "first line\n");
        assert_eq!(rx.try_recv().unwrap(), OutputEvent::Report("first line\n".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stream_error_before_output_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let client = client(EarlyBreak { calls: calls.clone() }, 10);
        let (sink, mut rx) = ChannelSink::channel();

        let text = client
            .create_chat_completion(&request(), true, Some(&sink))
            .await
            .unwrap();

        assert_eq!(text, "ok\n");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rx.try_recv().unwrap(), OutputEvent::Report("ok\n".to_string()));
        assert!(rx.try_recv().is_err());
    }
}
