//! Research request orchestration.
//!
//! Drives a single research request through four steps:
//! 1. **Query**: Bias the topic toward trusted sources and pick audience instructions
//! 2. **Research**: Ask the engine to gather and analyze sources
//! 3. **Write**: Ask the engine to draft the report
//! 4. **Assemble**: Shape the structured response or render the publishable draft
//!
//! The streaming path layers a six-stage presentation pipeline over the same steps.

pub mod engine;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod query;
pub mod request;
pub mod sources;

pub use engine::{EngineSettings, RawSource, ResearchEngine, ResearchFindings, ResearchJob};
pub use orchestrator::{EngineProfile, PreparedResearch, ResearchOrchestrator, ResearchResult};
pub use output::{ResearchMetadata, ResearchResponse, parse_sources, render_document};
pub use progress::{Pipeline, ProgressEvent, ProgressStreamer, Stage, StageId, StageStatus};
pub use query::{QueryBuilder, QueryPlan, audience_instructions};
pub use request::{Audience, ReadingLevel, ReportType, ResearchRequest};
pub use sources::SourceRecord;
