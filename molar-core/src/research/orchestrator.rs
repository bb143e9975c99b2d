//! Research orchestrator: builds the engine job, runs both engine phases in
//! order, and normalizes the engine's output.

use super::engine::{
    AzureSettings, EngineSettings, REPORT_FORMAT, ResearchEngine, ResearchFindings, ResearchJob,
};
use super::query::{QueryBuilder, QueryPlan};
use super::request::ResearchRequest;
use super::sources::{SourceRecord, collect_sources};
use crate::config::MolarConfig;
use crate::error::{EngineError, ResearchError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Provider and model selection, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    pub retriever: String,
    pub provider: String,
    pub fast_llm: String,
    pub smart_llm: String,
    pub embedding: String,
    pub azure: Option<AzureSettings>,
}

impl EngineProfile {
    pub fn from_config(config: &MolarConfig) -> Self {
        let llm = &config.llm;
        let azure = llm.is_azure().then(|| AzureSettings {
            api_version: llm.azure.api_version.clone(),
            endpoint: llm.azure.endpoint.clone(),
        });
        Self {
            retriever: config.engine.retriever.clone(),
            provider: llm.provider.clone(),
            fast_llm: llm.qualified(&llm.fast_model),
            smart_llm: llm.qualified(&llm.smart_model),
            embedding: llm.qualified(&llm.embedding_model),
            azure,
        }
    }
}

/// A request turned into an engine job.
#[derive(Debug, Clone)]
pub struct PreparedResearch {
    pub plan: QueryPlan,
    pub job: ResearchJob,
}

/// Normalized engine output for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchResult {
    pub report: String,
    /// Sources in engine order, capped to the request's budget.
    pub sources: Vec<SourceRecord>,
    pub generated_at: DateTime<Utc>,
}

/// Drives a research engine for individual requests.
///
/// Holds only read-only state, so one instance serves every request.
pub struct ResearchOrchestrator {
    engine: Arc<dyn ResearchEngine>,
    profile: EngineProfile,
    queries: QueryBuilder,
}

impl std::fmt::Debug for ResearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchOrchestrator")
            .field("engine", &self.engine.name())
            .field("profile", &self.profile)
            .field("trusted_sources", &self.queries.trusted_sources().len())
            .finish()
    }
}

impl ResearchOrchestrator {
    pub fn new(engine: Arc<dyn ResearchEngine>, profile: EngineProfile, queries: QueryBuilder) -> Self {
        Self {
            engine,
            profile,
            queries,
        }
    }

    /// Build an orchestrator from configuration around the given engine.
    pub fn from_config(config: &MolarConfig, engine: Arc<dyn ResearchEngine>) -> Self {
        Self::new(
            engine,
            EngineProfile::from_config(config),
            QueryBuilder::new(config.research.trusted_sources.clone()),
        )
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    /// Build the query plan and the immutable engine job for a request.
    pub fn prepare(&self, request: &ResearchRequest) -> PreparedResearch {
        let plan = self.queries.plan(request);
        let settings = EngineSettings {
            max_results: request.source_budget(),
            retriever: self.profile.retriever.clone(),
            report_format: REPORT_FORMAT.to_string(),
            include_citations: request.include_citations,
            fast_llm: self.profile.fast_llm.clone(),
            smart_llm: self.profile.smart_llm.clone(),
            embedding: self.profile.embedding.clone(),
            provider: self.profile.provider.clone(),
            custom_prompt: plan.custom_prompt.clone(),
            stream: false,
            azure: self.profile.azure.clone(),
        };
        let job = ResearchJob {
            query: plan.engine_query.clone(),
            report_type: request.report_type,
            settings,
        };
        PreparedResearch { plan, job }
    }

    /// Phase one: gather sources and analysis.
    pub async fn conduct(&self, job: &ResearchJob) -> Result<ResearchFindings, ResearchError> {
        let started = Instant::now();
        debug!(engine = self.engine.name(), query = %job.query, "Conducting research");
        let findings = self
            .engine
            .conduct_research(job)
            .await
            .map_err(|e| Self::failed("research", e))?;
        info!(
            sources = findings.source_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Research phase finished"
        );
        Ok(findings)
    }

    /// Phase two: draft the report from the findings of phase one.
    pub async fn write(
        &self,
        job: &ResearchJob,
        findings: &ResearchFindings,
    ) -> Result<String, ResearchError> {
        let started = Instant::now();
        let report = self
            .engine
            .write_report(job, findings)
            .await
            .map_err(|e| Self::failed("write", e))?;
        info!(
            chars = report.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Write phase finished"
        );
        Ok(report)
    }

    /// Normalize both phases' output into a result.
    pub fn collect(
        &self,
        request: &ResearchRequest,
        findings: ResearchFindings,
        report: String,
    ) -> ResearchResult {
        if findings.sources.is_none() {
            debug!("Engine reported no source list");
        }
        ResearchResult {
            report,
            sources: collect_sources(findings.sources, request.source_budget() as usize),
            generated_at: Utc::now(),
        }
    }

    /// Run a request to completion: prepare, research, write, collect.
    pub async fn run(&self, request: &ResearchRequest) -> Result<ResearchResult, ResearchError> {
        let prepared = self.prepare(request);
        let findings = self.conduct(&prepared.job).await?;
        let report = self.write(&prepared.job, &findings).await?;
        Ok(self.collect(request, findings, report))
    }

    fn failed(phase: &str, err: EngineError) -> ResearchError {
        warn!(phase, error = %err, "Research engine failed");
        ResearchError::Failed {
            message: err.to_string(),
        }
    }
}
