//! Research orchestration: search, scrape, summarize, then write the report.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::agents::prompts::{self, ReportType};
use crate::agents::{choose_agent, get_sub_queries, AgentProfile};
use crate::config::{Config, LLMConfig};
use crate::llm::{build_llm, CompletionClient};
use crate::memory::Memory;
use crate::output::{emit_log, EventSink};
use crate::retrievers::{get_retriever, Retriever, SearchResult};
use crate::scraping::{scrape_urls, PageFetcher, ScrapedPage, WebScraper};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

/// Long-lived clients shared by every research run.
pub struct ResearchServices {
    pub config: Config,
    pub completion: CompletionClient,
    pub retriever: Arc<dyn Retriever>,
    pub fetcher: Arc<dyn PageFetcher>,
    /// `None` when no embeddings key is configured.
    pub memory: Option<Memory>,
}

impl ResearchServices {
    pub fn from_config(config: Config) -> AppResult<Self> {
        let llm = build_llm(&config.llm)?;
        let completion = CompletionClient::from_config(Arc::new(llm), &config.llm);
        let retriever = get_retriever(&config.search, &config.scraper.user_agent)?;
        let fetcher: Arc<dyn PageFetcher> = Arc::new(WebScraper::new(&config.scraper)?);
        let memory = match Memory::new(&config.embedding) {
            Ok(memory) => Some(memory),
            Err(e) => {
                warn!(error = %e, "Embeddings disabled");
                None
            }
        };

        Ok(Self {
            config,
            completion,
            retriever,
            fetcher,
            memory,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    pub agent: AgentProfile,
    pub report: String,
    pub sources: Vec<SearchResult>,
    pub context: String,
}

pub struct Researcher {
    services: Arc<ResearchServices>,
    task: String,
    report_type: ReportType,
    sink: Arc<dyn EventSink>,
    agent: AgentProfile,
    visited_urls: HashSet<String>,
    sources: Vec<SearchResult>,
    context: Vec<String>,
}

impl Researcher {
    pub fn new(
        services: Arc<ResearchServices>,
        task: impl Into<String>,
        report_type: ReportType,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            services,
            task: task.into(),
            report_type,
            sink,
            agent: AgentProfile::default(),
            visited_urls: HashSet::new(),
            sources: Vec::new(),
            context: Vec::new(),
        }
    }

    pub async fn run(mut self) -> AppResult<ResearchOutcome> {
        self.conduct_research().await?;
        let report = self.write_report().await?;
        Ok(ResearchOutcome {
            agent: self.agent,
            report,
            sources: self.sources,
            context: self.context.join("\n\n"),
        })
    }

    pub async fn conduct_research(&mut self) -> AppResult<()> {
        let services = self.services.clone();
        let llm = &services.config.llm;
        let sink = self.sink.as_ref();

        if self.task.trim().is_empty() {
            return Err(AppError::InvalidRequest("Research task cannot be empty".to_string()));
        }
        info!(task = %self.task, report_type = %self.report_type, "Starting research");
        emit_log(sink, format!("Starting the research task for '{}'...", self.task)).await;

        self.agent = choose_agent(&services.completion, &llm.smart_llm_model, &self.task).await;
        emit_log(sink, self.agent.server.clone()).await;

        let mut queries = get_sub_queries(
            &services.completion,
            &llm.smart_llm_model,
            &self.task,
            &self.agent.agent_role_prompt,
        )
        .await;
        if !queries.iter().any(|q| q == &self.task) {
            queries.push(self.task.clone());
        }
        emit_log(
            sink,
            format!("I will conduct my research based on the following queries: {:?}...", queries),
        )
        .await;

        for query in &queries {
            let summaries = self.run_sub_query(&services, query).await;
            self.context.extend(summaries);
        }

        info!(
            sources = self.sources.len(),
            visited = self.visited_urls.len(),
            "Research complete"
        );
        if self.context.is_empty() {
            warn!(task = %self.task, "No context gathered, the report will rely on the model alone");
        }
        Ok(())
    }

    async fn run_sub_query(&mut self, services: &ResearchServices, query: &str) -> Vec<String> {
        let sink = self.sink.as_ref();
        emit_log(sink, format!("Running research for '{}'...", query)).await;

        let results = match services
            .retriever
            .search(query, services.config.search.max_results)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                warn!(query = %query, retriever = services.retriever.name(), error = %e, "Search failed");
                emit_log(sink, format!("Search failed for '{}': {}", query, e)).await;
                return Vec::new();
            }
        };

        let new_results: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| self.visited_urls.insert(r.href.clone()))
            .collect();
        if new_results.is_empty() {
            return Vec::new();
        }
        for result in &new_results {
            emit_log(sink, format!("Adding source url to research: {}", result.href)).await;
        }

        let urls: Vec<String> = new_results.iter().map(|r| r.href.clone()).collect();
        let concurrency = services.config.scraper.concurrency;
        let pages = scrape_urls(services.fetcher.clone(), &urls, concurrency).await;
        emit_log(sink, format!("Summarizing {} pages for '{}'", pages.len(), query)).await;

        let chunk_len = services.config.scraper.browse_chunk_max_length;
        let summaries: Vec<(ScrapedPage, AppResult<String>)> = stream::iter(pages)
            .map(|page| async move {
                let summary = summarize_page(&services.completion, &services.config.llm, query, &page, chunk_len).await;
                (page, summary)
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let mut context = Vec::new();
        for (page, summary) in summaries {
            match summary {
                Ok(summary) => {
                    let hit = new_results.iter().find(|r| r.href == page.url);
                    let title = match (page.title.is_empty(), hit) {
                        (true, Some(hit)) => hit.title.clone(),
                        _ => page.title.clone(),
                    };
                    context.push(format!("Source: {}\nTitle: {}\nContent: {}", page.url, title, summary));
                    self.sources.push(SearchResult {
                        title,
                        href: page.url,
                        body: hit.map(|h| h.body.clone()).unwrap_or_default(),
                    });
                }
                Err(e) => warn!(url = %page.url, error = %e, "Failed to summarize page"),
            }
        }
        context
    }

    /// Stream the report for the gathered context to the sink.
    pub async fn write_report(&self) -> AppResult<String> {
        let config = &self.services.config;
        emit_log(
            self.sink.as_ref(),
            format!("Writing {} for research task: {}...", self.report_type, self.task),
        )
        .await;

        let context = self.context.join("\n\n");
        let prompt = prompts::generate_report_prompt(
            self.report_type,
            &self.task,
            &context,
            &config.report.report_format,
            config.report.total_words,
        );
        let request = LLMRequest::new(
            &config.llm.smart_llm_model,
            vec![
                LLMMessage::system(&self.agent.agent_role_prompt),
                LLMMessage::user(prompt),
            ],
        )
        .with_temperature(config.llm.temperature)
        .with_max_tokens(config.llm.smart_token_limit);

        let report = self
            .services
            .completion
            .create_chat_completion(&request, true, Some(self.sink.as_ref()))
            .await?;
        info!(chars = report.len(), "Report written");
        Ok(report)
    }
}

async fn summarize_page(
    completion: &CompletionClient,
    llm: &LLMConfig,
    query: &str,
    page: &ScrapedPage,
    chunk_len: usize,
) -> AppResult<String> {
    let chunks = split_text(&page.text, chunk_len);
    if chunks.is_empty() {
        return Err(AppError::Scrape(format!("{} has no text", page.url)));
    }

    let mut summaries = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        summaries.push(summarize_text(completion, llm, query, chunk).await?);
    }
    if summaries.len() == 1 {
        return Ok(summaries.remove(0));
    }
    summarize_text(completion, llm, query, &summaries.join("\n")).await
}

async fn summarize_text(
    completion: &CompletionClient,
    llm: &LLMConfig,
    query: &str,
    text: &str,
) -> AppResult<String> {
    let request = LLMRequest::new(
        &llm.fast_llm_model,
        vec![LLMMessage::user(prompts::generate_summary_prompt(query, text))],
    )
    .with_temperature(llm.temperature)
    .with_max_tokens(llm.summary_token_limit);
    completion.create_chat_completion(&request, false, None).await
}

/// Split on whitespace into chunks of at most `max_len` bytes. A single word
/// longer than `max_len` becomes its own chunk.
pub(crate) fn split_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > max_len {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
