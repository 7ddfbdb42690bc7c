use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::{AgentProfile, ReportType, ResearchServices};
use crate::retrievers::SearchResult;

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<ResearchServices>,
}

impl AppState {
    pub fn new(services: ResearchServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub task: String,
}

/// Body of `POST /api/research` and of the websocket `start` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub task: String,
    #[serde(default)]
    pub report_type: ReportType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub id: uuid::Uuid,
    pub agent: AgentProfile,
    pub report: String,
    pub sources: Vec<SearchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsRequest {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsResponse {
    pub model: String,
    pub embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub llm_provider: String,
    pub retriever: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
