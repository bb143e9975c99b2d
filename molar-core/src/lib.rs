//! # Molar Core
//!
//! Core library for the Molar research service.
//! Turns a free-text topic into a vetted, audience-tailored research draft:
//! authentication, domain-biased query construction, orchestration of an
//! external research engine, staged progress streaming, and document assembly.

pub mod config;
pub mod engines;
pub mod error;
pub mod gateway;
pub mod research;

// Re-export commonly used types at the crate root.
pub use config::{MolarConfig, load_config};
pub use engines::{MockResearchEngine, WebResearchEngine, create_engine};
pub use error::{MolarError, Result};
pub use gateway::{AppState, AuthGate, router};
pub use research::{
    Audience, ReadingLevel, ReportType, ResearchEngine, ResearchOrchestrator, ResearchRequest,
    ResearchResponse, SourceRecord,
};
