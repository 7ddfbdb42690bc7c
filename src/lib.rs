// GPT Researcher - autonomous web research with streamed LLM reports

pub mod agents;
pub mod config;
pub mod llm;
pub mod memory;
pub mod models;
pub mod output;
pub mod retrievers;
pub mod routes;
pub mod scraping;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
