use axum::{extract::State, routing::post, Json, Router};

use crate::models::{AppState, EmbeddingsRequest, EmbeddingsResponse};
use crate::types::{AppError, AppResult};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/embeddings", post(embed))
        .with_state(state)
}

async fn embed(
    State(state): State<AppState>,
    Json(request): Json<EmbeddingsRequest>,
) -> AppResult<Json<EmbeddingsResponse>> {
    let memory = state
        .services
        .memory
        .as_ref()
        .ok_or_else(|| AppError::Config("Embeddings are not configured".to_string()))?;
    if request.texts.is_empty() {
        return Err(AppError::InvalidRequest("texts cannot be empty".to_string()));
    }

    let embeddings = memory.get_embeddings();
    let vectors = embeddings.embed_documents(&request.texts).await?;
    Ok(Json(EmbeddingsResponse {
        model: embeddings.model_name().to_string(),
        embeddings: vectors,
    }))
}
