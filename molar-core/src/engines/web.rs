//! Production research engine: Tavily retrieval plus an OpenAI-compatible writer.

use super::http_client;
use super::openai_compat::ChatWriter;
use super::tavily::TavilySearch;
use crate::config::MolarConfig;
use crate::error::EngineError;
use crate::research::{ResearchEngine, ResearchFindings, ResearchJob};
use async_trait::async_trait;
use tracing::info;

/// Retriever identifier this engine implements.
pub const TAVILY_RETRIEVER: &str = "tavily";

/// Research engine backed by live web search and a chat model.
///
/// API keys are read per request, so a missing key fails the request rather
/// than startup.
#[derive(Debug, Clone)]
pub struct WebResearchEngine {
    search: TavilySearch,
    writer: ChatWriter,
}

impl WebResearchEngine {
    pub fn new(search: TavilySearch, writer: ChatWriter) -> Self {
        Self { search, writer }
    }

    pub fn from_config(config: &MolarConfig) -> Result<Self, EngineError> {
        if config.engine.retriever != TAVILY_RETRIEVER {
            return Err(EngineError::Configuration {
                message: format!("unsupported retriever: {}", config.engine.retriever),
            });
        }
        let client = http_client(config.engine.connect_timeout_secs)?;
        let search = TavilySearch::new(client.clone(), &config.engine);
        let writer = ChatWriter::new(client, &config.llm)?;
        info!(
            retriever = %config.engine.retriever,
            provider = %config.llm.provider,
            "Web research engine ready"
        );
        Ok(Self::new(search, writer))
    }
}

#[async_trait]
impl ResearchEngine for WebResearchEngine {
    async fn conduct_research(&self, job: &ResearchJob) -> Result<ResearchFindings, EngineError> {
        let outcome = self
            .search
            .search(&job.query, job.settings.max_results)
            .await?;
        Ok(ResearchFindings {
            context: outcome.context(),
            sources: Some(outcome.sources),
        })
    }

    async fn write_report(
        &self,
        job: &ResearchJob,
        findings: &ResearchFindings,
    ) -> Result<String, EngineError> {
        self.writer.draft(job, findings).await
    }

    fn name(&self) -> &str {
        "web"
    }
}
