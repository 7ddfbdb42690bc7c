use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use tracing::info;
use uuid::Uuid;

use crate::agents::Researcher;
use crate::models::{AppState, ResearchRequest, ResearchResponse};
use crate::output::NullSink;
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/research", post(run_research))
        .with_state(state)
}

/// Runs the whole pipeline and answers once the report is complete.
async fn run_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> AppResult<Json<ResearchResponse>> {
    let id = Uuid::new_v4();
    info!(research_id = %id, task = %request.task, report_type = %request.report_type, "Research requested");

    let outcome = Researcher::new(
        state.services.clone(),
        request.task,
        request.report_type,
        Arc::new(NullSink),
    )
    .run()
    .await?;

    info!(research_id = %id, sources = outcome.sources.len(), "Research finished");
    Ok(Json(ResearchResponse {
        id,
        agent: outcome.agent,
        report: outcome.report,
        sources: outcome.sources,
    }))
}
