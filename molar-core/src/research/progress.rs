//! Staged progress reporting for streamed research.
//!
//! A fixed six-stage presentation pipeline is advanced by orchestrator
//! milestones, not by the engine's own progress. Each transition becomes a
//! [`ProgressEvent`] sent to the client, ending in exactly one terminal event
//! (`complete` or `error`).

use super::orchestrator::ResearchOrchestrator;
use super::output::{ResearchResponse, render_document};
use super::request::ResearchRequest;
use crate::error::{ResearchError, StreamError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Identifier of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Init,
    Search,
    Analyze,
    Synthesize,
    Generate,
    Finalize,
}

impl StageId {
    /// Every stage, in pipeline order.
    pub const ALL: [StageId; 6] = [
        Self::Init,
        Self::Search,
        Self::Analyze,
        Self::Synthesize,
        Self::Generate,
        Self::Finalize,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Init => "Initializing research",
            Self::Search => "Searching for sources",
            Self::Analyze => "Analyzing content",
            Self::Synthesize => "Synthesizing information",
            Self::Generate => "Generating report",
            Self::Finalize => "Finalizing document",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Active,
    Completed,
    Error,
}

/// A stage as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Partial update for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdate {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Events sent over the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Initial pipeline snapshot.
    Stages { stages: Vec<Stage> },
    /// One stage changed.
    StageUpdate {
        #[serde(rename = "stageId")]
        stage_id: StageId,
        update: StageUpdate,
    },
    /// The assembled draft document.
    Content { content: String },
    /// Terminal: the run succeeded.
    Complete,
    /// Terminal: the run failed.
    Error { error: String },
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error { .. })
    }
}

/// The fixed six-stage pipeline.
///
/// Stages only move forward: `pending -> active -> completed`, one stage
/// active at a time, every earlier stage completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// `init` completed, `search` active, the rest pending.
    pub fn new() -> Self {
        let stages = StageId::ALL
            .iter()
            .map(|&id| Stage {
                id,
                name: id.display_name().to_string(),
                status: match id {
                    StageId::Init => StageStatus::Completed,
                    StageId::Search => StageStatus::Active,
                    _ => StageStatus::Pending,
                },
                message: None,
            })
            .collect();
        Self { stages }
    }

    pub fn snapshot(&self) -> Vec<Stage> {
        self.stages.clone()
    }

    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id.index()]
    }

    /// The stage currently active, if any.
    pub fn current(&self) -> Option<StageId> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Active)
            .map(|s| s.id)
    }

    /// Whether every stage has completed.
    pub fn is_finished(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::Completed)
    }

    /// Make `id` the active stage. Re-activating the active stage refreshes its message.
    pub fn activate(
        &mut self,
        id: StageId,
        message: Option<String>,
    ) -> Result<StageUpdate, ResearchError> {
        let status = self.stage(id).status;
        match status {
            StageStatus::Active => {}
            StageStatus::Pending => {
                let earlier_done = self.stages[..id.index()]
                    .iter()
                    .all(|s| s.status == StageStatus::Completed);
                if !earlier_done {
                    return Err(Self::invalid(id, status, StageStatus::Active));
                }
            }
            StageStatus::Completed | StageStatus::Error => {
                return Err(Self::invalid(id, status, StageStatus::Active));
            }
        }
        Ok(self.apply(id, StageStatus::Active, message))
    }

    /// Complete the active stage `id`.
    pub fn complete(
        &mut self,
        id: StageId,
        message: Option<String>,
    ) -> Result<StageUpdate, ResearchError> {
        let status = self.stage(id).status;
        if status != StageStatus::Active {
            return Err(Self::invalid(id, status, StageStatus::Completed));
        }
        Ok(self.apply(id, StageStatus::Completed, message))
    }

    /// Mark the active stage as failed. `None` when no stage is active.
    pub fn fail(&mut self, message: Option<String>) -> Option<(StageId, StageUpdate)> {
        let id = self.current()?;
        Some((id, self.apply(id, StageStatus::Error, message)))
    }

    fn apply(&mut self, id: StageId, status: StageStatus, message: Option<String>) -> StageUpdate {
        let stage = &mut self.stages[id.index()];
        stage.status = status;
        stage.message = message.clone();
        StageUpdate { status, message }
    }

    fn invalid(id: StageId, from: StageStatus, to: StageStatus) -> ResearchError {
        ResearchError::Progress {
            message: format!("{id:?}: {from:?} -> {to:?}"),
        }
    }
}

/// Why a streamed run stopped early.
enum Halt {
    Research(ResearchError),
    Aborted,
}

impl From<ResearchError> for Halt {
    fn from(err: ResearchError) -> Self {
        Self::Research(err)
    }
}

impl From<StreamError> for Halt {
    fn from(_: StreamError) -> Self {
        Self::Aborted
    }
}

/// Drives one request through the orchestrator while reporting pipeline
/// progress over a channel.
pub struct ProgressStreamer {
    pipeline: Pipeline,
    tx: mpsc::Sender<ProgressEvent>,
    pacing: Duration,
}

impl ProgressStreamer {
    /// `pacing` is the cosmetic pause between presentation-only transitions.
    pub fn new(tx: mpsc::Sender<ProgressEvent>, pacing: Duration) -> Self {
        Self {
            pipeline: Pipeline::new(),
            tx,
            pacing,
        }
    }

    /// Run the request, emitting stage events and one terminal event.
    ///
    /// Returns `StreamError::Aborted` when the receiver went away; research
    /// failures are reported in-band as an `error` event.
    pub async fn run(
        mut self,
        orchestrator: &ResearchOrchestrator,
        request: ResearchRequest,
    ) -> Result<(), StreamError> {
        match self.drive(orchestrator, &request).await {
            Ok(()) => Ok(()),
            Err(Halt::Aborted) => Err(StreamError::Aborted),
            Err(Halt::Research(err)) => {
                let failed = self.pipeline.fail(Some(err.raw_message().to_string()));
                let stage = failed.as_ref().map(|(id, _)| *id);
                info!(?stage, error = %err, "Streamed research failed");
                if let Some((stage_id, update)) = failed {
                    self.emit(ProgressEvent::StageUpdate { stage_id, update })
                        .await?;
                }
                self.emit(ProgressEvent::Error {
                    error: err.raw_message().to_string(),
                })
                .await
            }
        }
    }

    async fn drive(
        &mut self,
        orchestrator: &ResearchOrchestrator,
        request: &ResearchRequest,
    ) -> Result<(), Halt> {
        self.emit(ProgressEvent::Stages {
            stages: self.pipeline.snapshot(),
        })
        .await?;

        let prepared = orchestrator.prepare(request);
        self.activate(StageId::Search, "Searching trusted dental sources...")
            .await?;

        let findings = self
            .unless_closed(orchestrator.conduct(&prepared.job))
            .await??;
        let found = findings
            .source_count()
            .min(request.source_budget() as usize);
        self.complete(StageId::Search, Some(format!("Found {found} relevant sources")))
            .await?;
        self.activate(StageId::Analyze, "Reading and analyzing content...")
            .await?;
        self.pause().await;

        self.complete(StageId::Analyze, None).await?;
        self.activate(StageId::Synthesize, "Organizing information...")
            .await?;
        self.pause().await;
        self.complete(StageId::Synthesize, None).await?;
        self.activate(
            StageId::Generate,
            &format!("Writing {} level content...", request.audience),
        )
        .await?;

        let report = self
            .unless_closed(orchestrator.write(&prepared.job, &findings))
            .await??;
        self.complete(StageId::Generate, None).await?;
        self.activate(StageId::Finalize, "Adding citations and formatting...")
            .await?;

        let result = orchestrator.collect(request, findings, report);
        let response = ResearchResponse::from_result(request, result);
        let document = render_document(&response);
        self.pause().await;
        self.complete(StageId::Finalize, None).await?;

        self.emit(ProgressEvent::Content { content: document })
            .await?;
        self.emit(ProgressEvent::Complete).await?;
        debug!(finished = self.pipeline.is_finished(), "Research stream complete");
        Ok(())
    }

    async fn activate(&mut self, id: StageId, message: &str) -> Result<(), Halt> {
        let update = self.pipeline.activate(id, Some(message.to_string()))?;
        self.emit_update(id, update).await
    }

    async fn complete(&mut self, id: StageId, message: Option<String>) -> Result<(), Halt> {
        let update = self.pipeline.complete(id, message)?;
        self.emit_update(id, update).await
    }

    async fn emit_update(&self, stage_id: StageId, update: StageUpdate) -> Result<(), Halt> {
        debug!(stage = ?stage_id, status = ?update.status, "Stage update");
        self.emit(ProgressEvent::StageUpdate { stage_id, update })
            .await
            .map_err(Halt::from)
    }

    async fn emit(&self, event: ProgressEvent) -> Result<(), StreamError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| StreamError::Aborted)
    }

    async fn pause(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }

    /// Await `fut`, abandoning it if the client disconnects first.
    async fn unless_closed<F: Future>(&self, fut: F) -> Result<F::Output, Halt> {
        tokio::select! {
            output = fut => Ok(output),
            _ = self.tx.closed() => Err(Halt::Aborted),
        }
    }
}
