//! Research engine abstraction.
//!
//! A research engine performs the actual web retrieval, content analysis, and
//! drafting. The orchestrator hands it an immutable [`ResearchJob`] and drives
//! it through two ordered phases: [`ResearchEngine::conduct_research`] and then
//! [`ResearchEngine::write_report`], which consumes the findings of the first.

use super::request::ReportType;
use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Format requested from every engine.
pub const REPORT_FORMAT: &str = "markdown";

/// Engine configuration for one request. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Iteration and result budget (the request's source count).
    pub max_results: u32,
    /// Retriever identifier, e.g. `tavily`.
    pub retriever: String,
    pub report_format: String,
    pub include_citations: bool,
    /// Qualified fast model, e.g. `openai:gpt-4o-mini`.
    pub fast_llm: String,
    /// Qualified smart model, e.g. `openai:gpt-4o`.
    pub smart_llm: String,
    /// Qualified embedding model.
    pub embedding: String,
    pub provider: String,
    /// Overrides the engine's default drafting prompt.
    pub custom_prompt: String,
    /// The engine's own token streaming. Always off.
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureSettings>,
}

/// Extra provider settings when the provider is Azure OpenAI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSettings {
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Everything an engine needs to research one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchJob {
    pub query: String,
    pub report_type: ReportType,
    pub settings: EngineSettings,
}

/// A source as reported by an engine. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSource {
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

impl RawSource {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            snippet: Some(snippet.into()),
        }
    }
}

/// Output of the research phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchFindings {
    /// Gathered context handed to the writing phase.
    pub context: String,
    /// Sources in engine order. `None` when the engine kept no list.
    pub sources: Option<Vec<RawSource>>,
}

impl ResearchFindings {
    /// Number of sources the engine reported.
    pub fn source_count(&self) -> usize {
        self.sources.as_ref().map_or(0, Vec::len)
    }
}

/// Trait for research engines.
#[async_trait]
pub trait ResearchEngine: Send + Sync {
    /// Gather sources and analysis for the job's query.
    async fn conduct_research(&self, job: &ResearchJob) -> Result<ResearchFindings, EngineError>;

    /// Draft the report from the gathered findings.
    async fn write_report(
        &self,
        job: &ResearchJob,
        findings: &ResearchFindings,
    ) -> Result<String, EngineError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}
