//! Scripted research engine for tests and offline development.

use crate::error::EngineError;
use crate::research::{RawSource, ResearchEngine, ResearchFindings, ResearchJob};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A research engine that returns canned output and records its calls.
pub struct MockResearchEngine {
    report: String,
    sources: Option<Vec<RawSource>>,
    research_failure: Option<String>,
    write_failure: Option<String>,
    delay: Duration,
    research_calls: AtomicUsize,
    write_calls: AtomicUsize,
    last_job: Mutex<Option<ResearchJob>>,
}

impl Default for MockResearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResearchEngine {
    pub fn new() -> Self {
        Self {
            report: "# Research Report\n\nMock findings on the requested topic.".to_string(),
            sources: Some(vec![
                RawSource::new(
                    "NHS: Dental health",
                    "https://www.nhs.uk/live-well/healthy-teeth-and-gums/",
                    "How to keep your teeth and gums healthy.",
                ),
                RawSource::new(
                    "Cochrane Oral Health",
                    "https://oralhealth.cochrane.org/",
                    "Systematic reviews of oral health interventions.",
                ),
            ]),
            research_failure: None,
            write_failure: None,
            delay: Duration::ZERO,
            research_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            last_job: Mutex::new(None),
        }
    }

    /// Return this report text from `write_report`.
    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = report.into();
        self
    }

    /// Report these sources from `conduct_research`.
    pub fn with_sources(mut self, sources: Vec<RawSource>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Report no source list at all.
    pub fn without_sources(mut self) -> Self {
        self.sources = None;
        self
    }

    /// Fail the research phase with this message.
    pub fn failing_research(mut self, message: impl Into<String>) -> Self {
        self.research_failure = Some(message.into());
        self
    }

    /// Fail the write phase with this message.
    pub fn failing_write(mut self, message: impl Into<String>) -> Self {
        self.write_failure = Some(message.into());
        self
    }

    /// Sleep this long in each phase.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn research_calls(&self) -> usize {
        self.research_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Total calls across both phases.
    pub fn total_calls(&self) -> usize {
        self.research_calls() + self.write_calls()
    }

    /// The most recent job passed to `conduct_research`.
    pub fn last_job(&self) -> Option<ResearchJob> {
        self.last_job.lock().ok().and_then(|job| job.clone())
    }

    async fn wait(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl ResearchEngine for MockResearchEngine {
    async fn conduct_research(&self, job: &ResearchJob) -> Result<ResearchFindings, EngineError> {
        self.research_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_job.lock() {
            *last = Some(job.clone());
        }
        self.wait().await;
        if let Some(message) = &self.research_failure {
            return Err(EngineError::Retrieval {
                message: message.clone(),
            });
        }
        Ok(ResearchFindings {
            context: format!("Mock context for: {}", job.query),
            sources: self.sources.clone(),
        })
    }

    async fn write_report(
        &self,
        _job: &ResearchJob,
        _findings: &ResearchFindings,
    ) -> Result<String, EngineError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.wait().await;
        if let Some(message) = &self.write_failure {
            return Err(EngineError::Provider {
                message: message.clone(),
            });
        }
        Ok(self.report.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
