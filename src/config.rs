use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::types::LLMProvider;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub scraper: ScraperConfig,
    pub report: ReportConfig,
    pub embedding: EmbeddingConfig,
    pub log_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    /// `None` disables the content-block fallback.
    pub fallback_provider: Option<LLMProvider>,
    pub fast_llm_model: String,
    pub smart_llm_model: String,
    pub fallback_llm_model: String,
    pub temperature: f32,
    pub smart_token_limit: u32,
    pub summary_token_limit: u32,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub google_api_key: String,
    pub gemini_base_url: Option<String>,
}

impl LLMConfig {
    pub fn api_key_for(&self, provider: LLMProvider) -> Option<String> {
        let key = match provider {
            LLMProvider::OpenAI => &self.openai_api_key,
            LLMProvider::Google => &self.google_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub retriever: String,
    pub max_results: usize,
    pub tavily_api_key: String,
    pub google_api_key: String,
    pub google_cx_key: String,
    pub serper_api_key: String,
    pub serpapi_api_key: String,
    pub searx_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub browse_chunk_max_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    pub total_words: u32,
    pub report_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let var = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let provider: LLMProvider = or("LLM_PROVIDER", "google").parse()?;
        let fallback_provider = match or("FALLBACK_LLM_PROVIDER", "openai").to_lowercase().as_str() {
            "none" | "off" => None,
            other => Some(other.parse::<LLMProvider>()?),
        };

        let openai_api_key = or("OPENAI_API_KEY", "");
        let google_api_key = or("GOOGLE_API_KEY", "");

        let embedding_provider: LLMProvider = or("EMBEDDING_PROVIDER", "google").parse()?;
        let (embedding_key, embedding_base_url, default_embedding_model) = match embedding_provider {
            LLMProvider::Google => (google_api_key.clone(), var("GEMINI_BASE_URL"), "models/embedding-001"),
            LLMProvider::OpenAI => (openai_api_key.clone(), var("OPENAI_BASE_URL"), "text-embedding-3-small"),
        };

        Ok(Self {
            server: ServerConfig {
                port: parse(vars, "PORT", 8000)?,
                host: or("HOST", "0.0.0.0"),
                cors_allowed_origins: or("ALLOWED_ORIGINS", "http://localhost:3000,http://localhost:8000")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                provider,
                fallback_provider,
                fast_llm_model: or("FAST_LLM_MODEL", "gemini-pro"),
                smart_llm_model: or("SMART_LLM_MODEL", "gemini-pro"),
                fallback_llm_model: or("FALLBACK_LLM_MODEL", "gpt-4o-mini"),
                temperature: parse(vars, "TEMPERATURE", 1.0)?,
                smart_token_limit: parse(vars, "SMART_TOKEN_LIMIT", 4000)?,
                summary_token_limit: parse(vars, "SUMMARY_TOKEN_LIMIT", 700)?,
                max_attempts: parse(vars, "LLM_MAX_ATTEMPTS", 10)?,
                retry_delay_ms: parse(vars, "LLM_RETRY_DELAY_MS", 0)?,
                openai_api_key,
                openai_base_url: var("OPENAI_BASE_URL"),
                google_api_key: google_api_key.clone(),
                gemini_base_url: var("GEMINI_BASE_URL"),
            },
            search: SearchConfig {
                retriever: or("RETRIEVER", "tavily"),
                max_results: parse(vars, "MAX_SEARCH_RESULTS_PER_QUERY", 5)?,
                tavily_api_key: or("TAVILY_API_KEY", ""),
                google_api_key,
                google_cx_key: or("GOOGLE_CX_KEY", ""),
                serper_api_key: or("SERPER_API_KEY", ""),
                serpapi_api_key: or("SERPAPI_API_KEY", ""),
                searx_url: or("SEARX_URL", ""),
            },
            scraper: ScraperConfig {
                concurrency: parse::<usize>(vars, "SCRAPE_CONCURRENCY", 4)?.max(1),
                timeout_secs: parse(vars, "SCRAPE_TIMEOUT_SECS", 20)?,
                user_agent: or("USER_AGENT", DEFAULT_USER_AGENT),
                browse_chunk_max_length: parse(vars, "BROWSE_CHUNK_MAX_LENGTH", 8192)?,
            },
            report: ReportConfig {
                total_words: parse(vars, "TOTAL_WORDS", 1000)?,
                report_format: or("REPORT_FORMAT", "apa"),
            },
            embedding: EmbeddingConfig {
                provider: embedding_provider,
                model: or("EMBEDDING_MODEL", default_embedding_model),
                api_key: embedding_key,
                base_url: embedding_base_url,
            },
            log_dir: var("LOG_DIR"),
        })
    }
}

fn parse<T>(vars: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match vars.get(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.llm.provider, LLMProvider::Google);
        assert_eq!(config.llm.fallback_provider, Some(LLMProvider::OpenAI));
        assert_eq!(config.llm.max_attempts, 10);
        assert_eq!(config.llm.retry_delay_ms, 0);
        assert_eq!(config.search.retriever, "tavily");
        assert_eq!(config.embedding.model, "models/embedding-001");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("PORT", "9000"),
            ("LLM_PROVIDER", "openai"),
            ("FALLBACK_LLM_PROVIDER", "none"),
            ("RETRIEVER", "duckduckgo"),
            ("EMBEDDING_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("ALLOWED_ORIGINS", "http://a, http://b,"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.llm.provider, LLMProvider::OpenAI);
        assert!(config.llm.fallback_provider.is_none());
        assert_eq!(config.search.retriever, "duckduckgo");
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.api_key, "sk-test");
        assert_eq!(config.server.cors_allowed_origins, vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::from_vars(&vars(&[("LLM_MAX_ATTEMPTS", "ten")])).unwrap_err();
        assert!(err.to_string().contains("LLM_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_api_key_lookup() {
        let config = Config::from_vars(&vars(&[("GOOGLE_API_KEY", "g-key")])).unwrap();
        assert_eq!(config.llm.api_key_for(LLMProvider::Google).as_deref(), Some("g-key"));
        assert!(config.llm.api_key_for(LLMProvider::OpenAI).is_none());
    }
}
