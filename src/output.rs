//! Research progress events and where they go.
//!
//! A run reports two kinds of output: `logs` (what the researcher is doing)
//! and `report` (paragraphs of the generated report as they stream in). The
//! JSON shape, `{"type": "...", "output": "..."}`, is what websocket clients
//! receive.

use async_trait::async_trait;
use crossterm::style::Stylize;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "output", rename_all = "lowercase")]
pub enum OutputEvent {
    Logs(String),
    Report(String),
    /// Identifier of the finished report, sent last.
    Path(String),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: OutputEvent) -> AppResult<()>;
}

/// Prints to stdout; report paragraphs in green.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

#[async_trait]
impl EventSink for ConsoleSink {
    async fn send(&self, event: OutputEvent) -> AppResult<()> {
        match event {
            OutputEvent::Logs(message) => println!("{}", message),
            OutputEvent::Report(paragraph) => print!("{}", paragraph.green()),
            OutputEvent::Path(path) => println!("{}", format!("Report saved: {}", path).cyan()),
        }
        Ok(())
    }
}

/// Drops every event; for callers that only want the final result.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn send(&self, _event: OutputEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Forwards events into a channel drained elsewhere (the websocket writer).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutputEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<OutputEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutputEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: OutputEvent) -> AppResult<()> {
        self.tx
            .send(event)
            .map_err(|_| AppError::Internal("event receiver closed".to_string()))
    }
}

/// Send an event, downgrading delivery failures (client gone) to a warning.
pub async fn emit(sink: &dyn EventSink, event: OutputEvent) {
    if let Err(e) = sink.send(event).await {
        tracing::warn!(error = %e, "Failed to deliver output event");
    }
}

/// Log a progress message and forward it to the sink.
pub async fn emit_log(sink: &dyn EventSink, message: impl Into<String>) {
    let message = message.into();
    tracing::info!(target: "gpt_researcher::progress", "{}", message);
    emit(sink, OutputEvent::Logs(message)).await;
}
