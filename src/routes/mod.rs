//! API Routes
//!
//! This module organizes all HTTP endpoints for the application:
//! - `/api/health` - Health checks
//! - `/api/agent` - Persona selection for a task
//! - `/api/research` - Full research run, report returned as JSON
//! - `/api/embeddings` - Embeddings through the configured provider
//! - `/ws` - Streaming research over a websocket

pub mod agent;
pub mod embeddings;
pub mod health;
pub mod research;
pub mod ws;

use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::models::{AppState, ErrorResponse};
use crate::types::AppError;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.services.config.server.cors_allowed_origins);

    Router::new()
        .merge(health::router(state.clone()))
        .merge(agent::router(state.clone()))
        .merge(research::router(state.clone()))
        .merge(embeddings::router(state.clone()))
        .merge(ws::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(origins)
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ContentBlocked(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::LLMApi(_) | AppError::Search(_) | AppError::Scrape(_) | AppError::Embedding(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        } else {
            warn!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}
