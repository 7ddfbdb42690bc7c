//! DuckDuckGo through its JavaScript-free HTML endpoint.
//!
//! Result anchors point at a `/l/?uddg=<target>` redirect; the target is
//! decoded from the query string. Sponsored results are skipped.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use super::{ensure_success, http_client, request_failed, Retriever, SearchError, SearchResult};

const DUCKDUCKGO_HTML_BASE: &str = "https://html.duckduckgo.com";

pub struct Duckduckgo {
    client: reqwest::Client,
    base_url: String,
}

impl Duckduckgo {
    pub fn new(user_agent: &str) -> Result<Self, SearchError> {
        Self::new_with_base_url(user_agent, DUCKDUCKGO_HTML_BASE)
    }

    pub fn new_with_base_url(user_agent: &str, base_url: &str) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(Some(user_agent))?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Retriever for Duckduckgo {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        info!(query = %query, "Searching DuckDuckGo");

        let response = self
            .client
            .get(format!("{}/html/", self.base_url))
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| request_failed("DuckDuckGo", e))?;
        let html = ensure_success("DuckDuckGo", response)
            .await?
            .text()
            .await
            .map_err(|e| request_failed("DuckDuckGo", e))?;

        let results = parse_results(&html, max_results)?;
        if results.is_empty() {
            warn!(query = %query, "DuckDuckGo returned no results");
        }
        Ok(results)
    }
}

fn selector(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::ParseError(format!("bad selector {}: {}", css, e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>, SearchError> {
    let document = Html::parse_document(html);
    let result_sel = selector("div.result")?;
    let link_sel = selector("a.result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut results = Vec::new();
    for result in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }
        if result.value().classes().any(|c| c == "result--ad") {
            continue;
        }
        let Some(link) = result.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href").and_then(resolve_href) else {
            continue;
        };
        let title = text_of(link);
        if title.is_empty() {
            continue;
        }
        let body = result.select(&snippet_sel).next().map(text_of).unwrap_or_default();

        results.push(SearchResult { title, href, body });
    }
    Ok(results)
}

/// Turn a result anchor into the target URL, unwrapping the `uddg` redirect.
pub(crate) fn resolve_href(href: &str) -> Option<String> {
    let base = Url::parse("https://duckduckgo.com/").ok()?;
    let url = base.join(href).ok()?;

    let is_ddg = url.host_str().is_some_and(|h| h.ends_with("duckduckgo.com"));
    if is_ddg {
        if url.path().starts_with("/l/") {
            return url
                .query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, target)| target.into_owned());
        }
        return None;
    }
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}
