//! # Research gateway
//!
//! HTTP surface for the research service: a health probe, two JSON research
//! endpoints, and a server-sent-events endpoint that reports pipeline
//! progress while a report is produced.

mod auth;
mod server;

pub use auth::AuthGate;
pub use server::{ApiError, cors_layer, router, run};

use crate::config::MolarConfig;
use crate::research::{ResearchEngine, ResearchOrchestrator};
use std::sync::Arc;
use std::time::Duration;

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "molar-research";

/// Read-only state shared by every handler.
#[derive(Debug)]
pub struct AppState {
    pub auth: AuthGate,
    pub orchestrator: Arc<ResearchOrchestrator>,
    /// Pause between presentation-only stream transitions.
    pub stage_pacing: Duration,
    /// Origins allowed by CORS. `*` allows any origin.
    pub origins: Vec<String>,
}

/// Thread-safe shared state reference for axum handlers.
pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: &MolarConfig, engine: Arc<dyn ResearchEngine>) -> Self {
        Self {
            auth: AuthGate::from_config(&config.auth),
            orchestrator: Arc::new(ResearchOrchestrator::from_config(config, engine)),
            stage_pacing: Duration::from_millis(config.research.stage_pacing_ms),
            origins: config.server.origins(),
        }
    }

    /// Override the stream pacing.
    pub fn with_stage_pacing(mut self, pacing: Duration) -> Self {
        self.stage_pacing = pacing;
        self
    }

    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }
}
