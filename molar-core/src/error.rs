//! Error types for the Molar core library.
//!
//! Uses `thiserror` for structured error variants. `MolarError` wraps the
//! failures that reach a caller of the library; authentication and stream
//! errors stay at the gateway.

/// Top-level error type for the Molar core library.
#[derive(Debug, thiserror::Error)]
pub enum MolarError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Research(#[from] ResearchError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bearer token failures. Both variants surface as HTTP 401.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing or invalid authorization header")]
    MissingOrMalformedHeader,

    #[error("Invalid authentication token")]
    InvalidToken,
}

/// Request fields outside their declared bounds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("Topic exceeds {max} characters")]
    TopicTooLong { max: usize },

    #[error("sources_count must be between {min} and {max}, got {value}")]
    SourcesCountOutOfRange { value: i64, min: u32, max: u32 },

    #[error("Malformed request body: {message}")]
    MalformedBody { message: String },
}

/// Failures while driving a research request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    /// The research engine failed during either phase. No partial result exists.
    #[error("Research failed: {message}")]
    Failed { message: String },

    /// The progress pipeline was driven out of order.
    #[error("Invalid stage transition: {message}")]
    Progress { message: String },
}

impl ResearchError {
    /// The underlying message without the `Research failed:` prefix.
    pub fn raw_message(&self) -> &str {
        match self {
            Self::Failed { message } | Self::Progress { message } => message,
        }
    }
}

/// Streaming failures that are never reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error("Client disconnected before the stream finished")]
    Aborted,
}

/// Errors raised by a research engine implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Engine misconfigured: {message}")]
    Configuration { message: String },

    #[error("Web retrieval failed: {message}")]
    Retrieval { message: String },

    #[error("Provider request failed: {message}")]
    Provider { message: String },

    #[error("Rate limited by {service}")]
    RateLimited { service: String },

    #[error("Could not parse {service} response: {message}")]
    ResponseParse { service: String, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// A type alias for results using the top-level `MolarError`.
pub type Result<T> = std::result::Result<T, MolarError>;
