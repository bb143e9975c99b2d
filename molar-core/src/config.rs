//! Configuration system for Molar.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded once at process start from `~/.config/molar/config.toml`,
//! an optional explicit TOML file, the legacy service environment variables, and
//! `MOLAR_`-prefixed environment variables. It is never mutated afterwards.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The auth token shipped with development setups. Startup warns when it is in use.
pub const DEVELOPMENT_TOKEN: &str = "development-token-change-in-production";

/// Top-level configuration for the Molar service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MolarConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub engine: EngineConfig,
    pub research: ResearchConfig,
}

/// HTTP listener and CORS settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Deployed frontend origin. When unset, any origin is allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontend_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "https://dentistry-explained.vercel.app".to_string(),
            ],
            frontend_url: None,
        }
    }
}

impl ServerConfig {
    /// Every origin CORS should accept, including the frontend (or `*`).
    pub fn origins(&self) -> Vec<String> {
        let mut origins = self.allowed_origins.clone();
        origins.push(self.frontend_url.clone().unwrap_or_else(|| "*".to_string()));
        origins
    }

    /// The `host:port` socket address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Static bearer token shared with the calling frontend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: DEVELOPMENT_TOKEN.to_string(),
        }
    }
}

impl AuthConfig {
    /// Whether the shipped development token is still configured.
    pub fn is_development_token(&self) -> bool {
        self.token == DEVELOPMENT_TOKEN
    }
}

/// LLM provider and model selection, resolved once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider identifier: `openai`, `azure`, or any OpenAI-compatible host.
    pub provider: String,
    pub fast_model: String,
    pub smart_model: String,
    pub embedding_model: String,
    /// Chat completions base URL for non-Azure providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the provider API key.
    pub api_key_env: String,
    /// Azure OpenAI settings, used when `provider` is `azure`.
    pub azure: AzureConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            fast_model: "gpt-4o-mini".to_string(),
            smart_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            azure: AzureConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Qualify a model name with the provider, e.g. `openai:gpt-4o`.
    pub fn qualified(&self, model: &str) -> String {
        format!("{}:{}", self.provider, model)
    }

    pub fn is_azure(&self) -> bool {
        self.provider.eq_ignore_ascii_case("azure")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub api_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub api_key_env: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_version: "2024-05-01-preview".to_string(),
            endpoint: None,
            api_key_env: "AZURE_OPENAI_API_KEY".to_string(),
        }
    }
}

/// Settings for the web research engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retriever identifier passed to the engine.
    pub retriever: String,
    /// Search API base URL.
    pub search_base_url: String,
    /// Environment variable holding the search API key.
    pub search_api_key_env: String,
    /// `basic` or `advanced`.
    pub search_depth: String,
    /// TCP connect timeout for outbound engine requests.
    pub connect_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retriever: "tavily".to_string(),
            search_base_url: "https://api.tavily.com".to_string(),
            search_api_key_env: "TAVILY_API_KEY".to_string(),
            search_depth: "advanced".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

/// Query biasing and stream presentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Domains the engine is asked to restrict results to.
    pub trusted_sources: Vec<String>,
    /// Pause between cosmetic stage transitions on the streaming path.
    pub stage_pacing_ms: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            trusted_sources: [
                "nhs.uk",
                "nice.org.uk",
                "bda.org",
                "gdc-uk.org",
                "ada.org",
                "cochrane.org",
                "ncbi.nlm.nih.gov/pubmed",
                "bmj.com",
                "nature.com/bdj",
                "journals.sagepub.com",
                "onlinelibrary.wiley.com",
                "sciencedirect.com",
                "thelancet.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            stage_pacing_ms: 1000,
        }
    }
}

/// Command-line overrides for the listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl MolarConfig {
    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "auth.token must not be empty".into(),
            });
        }
        if self.research.trusted_sources.is_empty()
            || self
                .research
                .trusted_sources
                .iter()
                .any(|s| s.trim().is_empty())
        {
            return Err(ConfigError::Invalid {
                message: "research.trusted_sources must be a non-empty list of domains".into(),
            });
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid {
                message: "server.port must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// A copy safe to print: the auth token is masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.auth.token = "********".to_string();
        copy
    }
}

/// Map the environment variables the service has always read onto config keys.
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        let mapped = match key.as_str().to_ascii_uppercase().as_str() {
            "RESEARCH_SERVICE_AUTH_TOKEN" => "auth.token",
            "LLM_PROVIDER" => "llm.provider",
            "FAST_LLM_MODEL" => "llm.fast_model",
            "SMART_LLM_MODEL" => "llm.smart_model",
            "EMBEDDING_MODEL" => "llm.embedding_model",
            "FRONTEND_URL" => "server.frontend_url",
            "OPENAI_API_VERSION" => "llm.azure.api_version",
            "AZURE_OPENAI_ENDPOINT" => "llm.azure.endpoint",
            _ => return None,
        };
        Some(mapped.into())
    })
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables prefixed with `MOLAR_` (`MOLAR_SERVER__PORT`, ...)
/// 3. Legacy service variables (`RESEARCH_SERVICE_AUTH_TOKEN`, `LLM_PROVIDER`, ...)
/// 4. Explicit config file
/// 5. User config (`~/.config/molar/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&ServerOverrides>,
) -> Result<MolarConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(MolarConfig::default()));

    if let Some(dirs) = directories::ProjectDirs::from("dev", "molar", "molar") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::Invalid {
                message: format!("config file not found: {}", path.display()),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment
        .merge(legacy_env())
        .merge(Env::prefixed("MOLAR_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::default("server", overrides));
    }

    let config: MolarConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
