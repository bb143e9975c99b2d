//! Research engine implementations.
//!
//! Provides concrete implementations of the `ResearchEngine` trait:
//! - `WebResearchEngine`: Tavily web retrieval plus an OpenAI-compatible writer
//! - `MockResearchEngine`: scripted output for tests and local development
//!
//! Use `create_engine()` to instantiate the production engine from config.

pub mod mock;
pub mod openai_compat;
pub mod tavily;
pub mod web;

use crate::config::MolarConfig;
use crate::error::EngineError;
use crate::research::ResearchEngine;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

pub use mock::MockResearchEngine;
pub use openai_compat::ChatWriter;
pub use tavily::TavilySearch;
pub use web::WebResearchEngine;

/// Create the production research engine from configuration.
pub fn create_engine(config: &MolarConfig) -> Result<Arc<dyn ResearchEngine>, EngineError> {
    let engine = WebResearchEngine::from_config(config)?;
    Ok(Arc::new(engine))
}

/// Shared HTTP client for outbound engine calls.
///
/// Only the connect phase is bounded; long research calls are left to finish.
pub(crate) fn http_client(connect_timeout_secs: u64) -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .user_agent(concat!("molar/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| EngineError::Configuration {
            message: format!("Failed to create HTTP client: {e}"),
        })
}

/// Read an API key from the named environment variable, ignoring blanks.
pub(crate) fn api_key_from_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

/// Map a non-success HTTP response to an engine error.
pub(crate) fn map_http_error(service: &str, status: StatusCode, body: &str) -> EngineError {
    let excerpt: String = body.chars().take(300).collect();
    match status.as_u16() {
        401 | 403 => EngineError::Provider {
            message: format!("{service} rejected the credentials ({status})"),
        },
        429 => EngineError::RateLimited {
            service: service.to_string(),
        },
        _ => EngineError::Provider {
            message: format!("{service} returned {status}: {excerpt}"),
        },
    }
}
