//! Server-sent events decoding shared by the streaming adapters.
//!
//! Both vendors answer a streaming request with `data: {json}` lines; OpenAI
//! terminates with `data: [DONE]`.

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::types::{AppError, AppResult};

/// Split a streaming HTTP body into the payloads of its `data:` lines.
pub fn data_lines(response: reqwest::Response) -> impl Stream<Item = AppResult<String>> + Send + 'static {
    let mut body = Box::pin(response.bytes_stream());

    try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| AppError::LLMApi(format!("Stream read failed: {}", e)))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(data) = parse_data_line(&String::from_utf8_lossy(&line)) {
                    tracing::trace!(data = %data, "sse event");
                    yield data;
                }
            }
        }

        if let Some(data) = parse_data_line(&String::from_utf8_lossy(&buffer)) {
            yield data;
        }
    }
}

/// Payload of a single SSE line, or `None` for comments, blank lines and `[DONE]`.
pub fn parse_data_line(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        None
    } else {
        Some(data.to_string())
    }
}
