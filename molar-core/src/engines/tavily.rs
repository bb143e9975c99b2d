//! Tavily web search retrieval.
//!
//! Sends the engine query to the Tavily search API and turns each result into
//! a [`RawSource`]. The result content also forms the context for drafting.

use super::{api_key_from_env, map_http_error};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::research::RawSource;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

/// Tavily refuses `max_results` above this.
pub const TAVILY_MAX_RESULTS: u32 = 20;

const SERVICE: &str = "tavily";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: Option<String>,
    url: Option<String>,
    content: Option<String>,
}

/// Results of one search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    pub answer: Option<String>,
    pub sources: Vec<RawSource>,
}

impl SearchOutcome {
    /// Numbered context block for the writer.
    pub fn context(&self) -> String {
        let mut out = String::new();
        if let Some(answer) = &self.answer {
            out.push_str(&format!("Summary: {answer}\n\n"));
        }
        for (i, source) in self.sources.iter().enumerate() {
            out.push_str(&format!(
                "[{}] {} ({})\n{}\n\n",
                i + 1,
                source.title.as_deref().unwrap_or("Untitled"),
                source.url.as_deref().unwrap_or(""),
                source.snippet.as_deref().unwrap_or("")
            ));
        }
        out.trim_end().to_string()
    }
}

/// Client for the Tavily search endpoint.
#[derive(Debug, Clone)]
pub struct TavilySearch {
    client: Client,
    base_url: String,
    api_key_env: String,
    search_depth: String,
}

impl TavilySearch {
    pub fn new(client: Client, config: &EngineConfig) -> Self {
        Self {
            client,
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
            api_key_env: config.search_api_key_env.clone(),
            search_depth: config.search_depth.clone(),
        }
    }

    /// Search for `query`, returning at most `max_results` sources.
    pub async fn search(&self, query: &str, max_results: u32) -> Result<SearchOutcome, EngineError> {
        let api_key = api_key_from_env(&self.api_key_env).ok_or_else(|| {
            EngineError::Configuration {
                message: format!("{} is not set", self.api_key_env),
            }
        })?;

        let url = format!("{}/search", self.base_url);
        let body = json!({
            "query": query,
            "max_results": max_results.clamp(1, TAVILY_MAX_RESULTS),
            "search_depth": self.search_depth,
            "include_answer": true,
        });
        debug!(url = %url, max_results, "Sending search request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Retrieval {
                message: format!("search request failed: {e}"),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| EngineError::Retrieval {
            message: format!("could not read search response: {e}"),
        })?;
        if !status.is_success() {
            return Err(map_http_error(SERVICE, status, &text));
        }
        parse_search_response(&text)
    }
}

/// Parse a Tavily response body.
pub fn parse_search_response(body: &str) -> Result<SearchOutcome, EngineError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| EngineError::ResponseParse {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })?;
    let sources = parsed
        .results
        .into_iter()
        .map(|hit| RawSource {
            title: hit.title,
            url: hit.url,
            snippet: hit.content,
        })
        .collect();
    Ok(SearchOutcome {
        answer: parsed.answer.filter(|a| !a.trim().is_empty()),
        sources,
    })
}
