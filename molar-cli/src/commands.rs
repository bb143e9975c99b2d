//! CLI subcommand handlers.

use molar_core::config::{ServerOverrides, load_config};
use molar_core::research::{
    Audience, ReadingLevel, ReportType, ResearchOrchestrator, ResearchRequest, ResearchResponse,
    render_document,
};
use molar_core::{MolarConfig, ResearchEngine, create_engine, gateway};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Arguments for `molar research`.
#[derive(clap::Args, Debug)]
pub struct ResearchArgs {
    /// Topic to research
    pub topic: String,

    /// Apply the professional rewrite (clinical evidence, at most 15 sources)
    #[arg(long)]
    pub professional: bool,

    /// Report type: research_report, outline_report, detailed_report
    #[arg(long, default_value = "research_report", value_parser = parse_enum::<ReportType>)]
    pub report_type: ReportType,

    /// Audience: general or professional
    #[arg(long, default_value = "general", value_parser = parse_enum::<Audience>)]
    pub audience: Audience,

    /// Reading level: basic, intermediate, advanced
    #[arg(long, default_value = "intermediate", value_parser = parse_enum::<ReadingLevel>)]
    pub reading_level: ReadingLevel,

    /// Number of sources (5-20)
    #[arg(long, default_value_t = 10)]
    pub sources: i64,

    /// Do not bias the search toward trusted medical sources
    #[arg(long)]
    pub no_medical_focus: bool,

    /// Ask the writer to omit citations
    #[arg(long)]
    pub no_citations: bool,

    /// Print the structured JSON response instead of the draft document
    #[arg(long)]
    pub json: bool,
}

impl ResearchArgs {
    fn into_request(self) -> ResearchRequest {
        let mut request = ResearchRequest::new(self.topic);
        request.report_type = self.report_type;
        request.audience = self.audience;
        request.reading_level = self.reading_level;
        request.sources_count = self.sources;
        request.focus_medical = !self.no_medical_focus;
        request.include_citations = !self.no_citations;
        request
    }
}

/// Parse a value with the same spelling the HTTP API accepts.
fn parse_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unsupported value '{value}'"))
}

fn load(
    config_file: Option<&Path>,
    overrides: Option<&ServerOverrides>,
) -> molar_core::Result<MolarConfig> {
    let config = load_config(config_file, overrides)?;
    if config.auth.is_development_token() {
        warn!("Using the development auth token; set RESEARCH_SERVICE_AUTH_TOKEN in production");
    }
    Ok(config)
}

fn load_engine(config: &MolarConfig) -> molar_core::Result<Arc<dyn ResearchEngine>> {
    Ok(create_engine(config)?)
}

/// Validate, optionally apply the professional rewrite, then run to a response.
async fn draft(
    orchestrator: &ResearchOrchestrator,
    request: ResearchRequest,
    professional: bool,
) -> molar_core::Result<ResearchResponse> {
    request.validate()?;
    let request = if professional {
        request.into_professional()
    } else {
        request
    };
    let result = orchestrator.run(&request).await?;
    Ok(ResearchResponse::from_result(&request, result))
}

pub async fn serve(
    config_file: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let overrides = ServerOverrides { host, port };
    let config = load(config_file, Some(&overrides))?;
    let engine = load_engine(&config)?;
    info!(
        provider = %config.llm.provider,
        smart_model = %config.llm.smart_model,
        origins = ?config.server.origins(),
        "Starting research gateway"
    );
    gateway::run(&config, engine, shutdown_signal()).await?;
    Ok(())
}

pub async fn research(config_file: Option<&Path>, args: ResearchArgs) -> anyhow::Result<()> {
    let config = load(config_file, None)?;
    let json = args.json;
    let professional = args.professional;

    let orchestrator = ResearchOrchestrator::from_config(&config, load_engine(&config)?);
    let response = draft(&orchestrator, args.into_request(), professional).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", render_document(&response));
    }
    Ok(())
}

pub fn show_config(config_file: Option<&Path>) -> anyhow::Result<()> {
    let config = load(config_file, None)?;
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
