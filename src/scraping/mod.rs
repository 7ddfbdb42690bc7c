//! Page scraping
//!
//! Fetches search hits and reduces them to readable text for summarization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::types::{AppError, AppResult};

const SKIPPED_ELEMENTS: [&str; 5] = ["script", "style", "noscript", "svg", "template"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub title: String,
    pub text: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<ScrapedPage>;
}

pub struct WebScraper {
    client: reqwest::Client,
}

impl WebScraper {
    pub fn new(config: &ScraperConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for WebScraper {
    async fn fetch(&self, url: &str) -> AppResult<ScrapedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Scrape(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Scrape(format!("{} returned {}", url, status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_lowercase();
        if !(content_type.contains("html") || content_type.starts_with("text/")) {
            return Err(AppError::Scrape(format!("{} has unsupported content type {}", url, content_type)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Scrape(format!("{}: {}", url, e)))?;

        let (title, text) = if content_type.contains("html") {
            extract_html(&body)
        } else {
            (String::new(), collapse_whitespace(&body))
        };
        debug!(url = %url, chars = text.len(), "Page scraped");

        Ok(ScrapedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Title and visible body text of an HTML document.
pub fn extract_html(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next().map(|t| t.text().collect::<String>()))
        .map(|t| collapse_whitespace(&t))
        .unwrap_or_default();

    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut pieces = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            pieces.push(&**text);
        }
    }

    (title, collapse_whitespace(&pieces.join(" ")))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Scrape `urls` with at most `concurrency` requests in flight.
///
/// Failed or empty pages are logged and left out; the rest keep input order.
pub async fn scrape_urls(
    fetcher: Arc<dyn PageFetcher>,
    urls: &[String],
    concurrency: usize,
) -> Vec<ScrapedPage> {
    info!(count = urls.len(), concurrency, "Scraping URLs");

    let mut results: Vec<(usize, AppResult<ScrapedPage>)> = stream::iter(urls.iter().cloned().enumerate())
        .map(|(idx, url)| {
            let fetcher = fetcher.clone();
            async move { (idx, fetcher.fetch(&url).await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|(idx, _)| *idx);

    let mut pages = Vec::with_capacity(results.len());
    for (idx, result) in results {
        match result {
            Ok(page) if page.text.is_empty() => {
                warn!(url = %urls[idx], "Scraped page has no text, skipping");
            }
            Ok(page) => pages.push(page),
            Err(e) => warn!(url = %urls[idx], error = %e, "Failed to scrape URL"),
        }
    }
    pages
}
