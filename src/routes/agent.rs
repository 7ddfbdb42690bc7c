use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

use crate::agents::{choose_agent, AgentProfile};
use crate::models::{AgentRequest, AppState};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/agent", post(select_agent))
        .with_state(state)
}

async fn select_agent(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> AppResult<Json<AgentProfile>> {
    if request.task.trim().is_empty() {
        return Err(AppError::InvalidRequest("task cannot be empty".to_string()));
    }
    info!(task = %request.task, "Agent selection requested");

    let services = &state.services;
    let agent = choose_agent(&services.completion, &services.config.llm.smart_llm_model, &request.task).await;
    Ok(Json(agent))
}
