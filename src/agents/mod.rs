//! Agent System
//!
//! Persona selection and the research pipeline:
//!
//! - **choose_agent**: Classifies the task and picks a research persona
//! - **get_sub_queries**: Expands the task into search queries
//! - **Researcher**: Searches, scrapes, summarizes and writes the report
//!
//! ## Pipeline Overview
//!
//! ```text
//!    Task
//!      │
//!      ▼
//! ┌─────────────┐
//! │ choose_agent│  → persona + role prompt
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ sub-queries │  → search each with the retriever
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │   scrape +  │  → summaries become the context
//! │  summarize  │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ write_report│  → streamed paragraph by paragraph
//! └─────────────┘
//! ```

pub mod prompts;
pub mod researcher;

pub use prompts::ReportType;
pub use researcher::{ResearchOutcome, ResearchServices, Researcher};

use crossterm::style::Stylize;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::llm::CompletionClient;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

pub const DEFAULT_AGENT: &str = "Default Agent";
pub const DEFAULT_AGENT_ROLE_PROMPT: &str = "You are an AI critical thinker research assistant. Your sole purpose is to write well written, critically acclaimed, objective and structured reports on given text.";

/// Number of search queries generated per task.
const SUB_QUERY_COUNT: usize = 3;

/// A research persona: display name plus the system prompt it writes with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub server: String,
    pub agent_role_prompt: String,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            server: DEFAULT_AGENT.to_string(),
            agent_role_prompt: DEFAULT_AGENT_ROLE_PROMPT.to_string(),
        }
    }
}

/// Pick the persona for `task`. Never fails: any error yields the default agent.
pub async fn choose_agent(client: &CompletionClient, model: &str, task: &str) -> AgentProfile {
    let request = LLMRequest::new(
        model,
        vec![
            LLMMessage::system(prompts::auto_agent_instructions()),
            LLMMessage::user(format!("task: {}", task)),
        ],
    )
    .with_temperature(0.0);

    let result = client
        .create_chat_completion(&request, false, None)
        .await
        .and_then(|response| parse_json::<AgentProfile>(&response));

    match result {
        Ok(agent) => {
            info!(server = %agent.server, "Agent selected");
            agent
        }
        Err(e) => {
            eprintln!("{}", format!("Error in choose_agent: {}", e).red());
            error!(error = %e, "Failed to choose agent, using default agent");
            AgentProfile::default()
        }
    }
}

/// Search queries for `task`; the task alone when the answer is unusable.
pub async fn get_sub_queries(
    client: &CompletionClient,
    model: &str,
    task: &str,
    agent_role_prompt: &str,
) -> Vec<String> {
    let request = LLMRequest::new(
        model,
        vec![
            LLMMessage::system(agent_role_prompt),
            LLMMessage::user(prompts::generate_search_queries_prompt(task, SUB_QUERY_COUNT)),
        ],
    )
    .with_temperature(0.0);

    let result = client
        .create_chat_completion(&request, false, None)
        .await
        .and_then(|response| parse_json::<Vec<String>>(&response));

    match result {
        Ok(queries) => {
            let queries: Vec<String> = queries
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect();
            if queries.is_empty() {
                vec![task.to_string()]
            } else {
                queries
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to generate sub-queries, searching the task only");
            vec![task.to_string()]
        }
    }
}

/// Strip a markdown code fence, if any, around a JSON answer.
pub(crate) fn extract_json(response: &str) -> &str {
    if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(response)
            .trim()
    } else if response.contains("```") {
        response.split("```").nth(1).unwrap_or(response).trim()
    } else {
        response.trim()
    }
}

pub(crate) fn parse_json<T: DeserializeOwned>(response: &str) -> AppResult<T> {
    serde_json::from_str(extract_json(response))
        .map_err(|e| AppError::Internal(format!("Failed to parse LLM JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fallback::tests::ScriptedAdapter;
    use crate::utils::retry::RetryPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(adapter: ScriptedAdapter) -> CompletionClient {
        CompletionClient::new(Arc::new(adapter), RetryPolicy::new(2, Duration::ZERO))
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("Sure:\n```\n[1]\n```"), "[1]");
        assert_eq!(extract_json("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_choose_agent_parses_fenced_json() {
        let adapter = ScriptedAdapter::ok(&[
            "```json\n{\"server\": \"💰 Finance Agent\", \"agent_role_prompt\": \"You are a finance analyst.\"}\n```",
        ]);
        let agent = choose_agent(&client(adapter), "gemini-pro", "should I invest in apple stocks?").await;
        assert_eq!(agent.server, "💰 Finance Agent");
        assert_eq!(agent.agent_role_prompt, "You are a finance analyst.");
    }

    #[tokio::test]
    async fn test_choose_agent_defaults_on_bad_json() {
        let adapter = ScriptedAdapter::ok(&["I think a finance agent would fit."]);
        let agent = choose_agent(&client(adapter), "gemini-pro", "stocks").await;
        assert_eq!(agent, AgentProfile::default());
        assert_eq!(agent.server, "Default Agent");
    }

    #[tokio::test]
    async fn test_choose_agent_defaults_on_llm_failure() {
        let adapter = ScriptedAdapter::failing(|| AppError::LLMApi("down".to_string()));
        let agent = choose_agent(&client(adapter), "gemini-pro", "stocks").await;
        assert_eq!(agent.agent_role_prompt, DEFAULT_AGENT_ROLE_PROMPT);
    }

    #[tokio::test]
    async fn test_get_sub_queries() {
        let adapter = ScriptedAdapter::ok(&["[\"rust async runtime\", \" \", \"tokio vs async-std\"]"]);
        let queries = get_sub_queries(&client(adapter), "gemini-pro", "async rust", "role").await;
        assert_eq!(queries, vec!["rust async runtime", "tokio vs async-std"]);

        let adapter = ScriptedAdapter::ok(&["not json"]);
        let queries = get_sub_queries(&client(adapter), "gemini-pro", "async rust", "role").await;
        assert_eq!(queries, vec!["async rust"]);
    }
}
