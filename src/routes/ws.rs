//! WebSocket endpoint: run a research task and stream its progress.
//!
//! The client sends `start {"task": ..., "report_type": ...}` (the `start`
//! prefix is optional). The server answers with `logs` and `report` events and
//! finishes with a `path` event carrying the report id.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{ResearchServices, Researcher};
use crate::models::{AppState, ResearchRequest};
use crate::output::{emit, emit_log, ChannelSink, EventSink, OutputEvent};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (sink, mut rx) = ChannelSink::channel();

    // Sender task: forward output events to the WebSocket.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    error!(error = %e, "Failed to serialize output event");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut research: Option<JoinHandle<()>> = None;

    while let Some(Ok(ws_msg)) = receiver.next().await {
        let text = match ws_msg {
            WsMessage::Text(t) => t,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let request = match parse_command(text.as_str()) {
            Ok(request) => request,
            Err(e) => {
                emit(&sink, OutputEvent::Logs(e.to_string())).await;
                continue;
            }
        };
        if research.as_ref().is_some_and(|task| !task.is_finished()) {
            emit_log(&sink, "A research task is already running on this connection").await;
            continue;
        }
        research = Some(tokio::spawn(run_session(state.services.clone(), request, sink.clone())));
    }

    info!("WebSocket closed");
    if let Some(task) = research {
        task.abort();
    }
    send_task.abort();
}

async fn run_session(services: Arc<ResearchServices>, request: ResearchRequest, sink: ChannelSink) {
    let id = Uuid::new_v4();
    info!(research_id = %id, task = %request.task, "WebSocket research started");

    let events: Arc<dyn EventSink> = Arc::new(sink.clone());
    match Researcher::new(services, request.task, request.report_type, events).run().await {
        Ok(outcome) => {
            info!(research_id = %id, sources = outcome.sources.len(), "WebSocket research finished");
            emit(&sink, OutputEvent::Path(id.to_string())).await;
        }
        Err(e) => {
            warn!(research_id = %id, error = %e, "WebSocket research failed");
            emit_log(&sink, format!("Research failed: {}", e)).await;
        }
    }
}

/// Parse `start {json}` or a bare JSON research request.
pub(crate) fn parse_command(text: &str) -> AppResult<ResearchRequest> {
    let text = text.trim();
    let payload = text.strip_prefix("start").map(str::trim_start).unwrap_or(text);
    let request: ResearchRequest = serde_json::from_str(payload)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid research command: {}", e)))?;
    if request.task.trim().is_empty() {
        return Err(AppError::InvalidRequest("task cannot be empty".to_string()));
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ReportType;

    #[test]
    fn test_parse_start_command() {
        let request = parse_command(r#"start {"task": "EV adoption", "report_type": "resource_report"}"#).unwrap();
        assert_eq!(request.task, "EV adoption");
        assert_eq!(request.report_type, ReportType::ResourceReport);

        let request = parse_command(r#"  {"task": "EV adoption"}  "#).unwrap();
        assert_eq!(request.report_type, ReportType::ResearchReport);
    }

    #[test]
    fn test_parse_invalid_command() {
        assert!(matches!(parse_command("start"), Err(AppError::InvalidRequest(_))));
        assert!(matches!(parse_command(r#"start {"task": " "}"#), Err(AppError::InvalidRequest(_))));
        assert!(matches!(parse_command("hello"), Err(AppError::InvalidRequest(_))));
    }
}
