//! OpenAI-compatible report writer.
//!
//! Drafts the report with a single non-streaming chat completion. Works with
//! OpenAI, Azure OpenAI deployments, and any endpoint that follows the OpenAI
//! chat completions API format.

use super::{api_key_from_env, map_http_error};
use crate::config::LlmConfig;
use crate::error::EngineError;
use crate::research::{ReportType, ResearchFindings, ResearchJob};
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const SERVICE: &str = "openai";

/// Where and how to authenticate chat requests.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    OpenAi { base_url: String },
    Azure { endpoint: String, api_version: String },
}

/// Writes reports through a chat completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatWriter {
    client: Client,
    endpoint: Endpoint,
    api_key_env: String,
}

impl ChatWriter {
    pub fn new(client: Client, config: &LlmConfig) -> Result<Self, EngineError> {
        let (endpoint, api_key_env) = if config.is_azure() {
            let endpoint = config
                .azure
                .endpoint
                .clone()
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| EngineError::Configuration {
                    message: "Azure provider requires AZURE_OPENAI_ENDPOINT".into(),
                })?;
            (
                Endpoint::Azure {
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    api_version: config.azure.api_version.clone(),
                },
                config.azure.api_key_env.clone(),
            )
        } else {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
            (
                Endpoint::OpenAi {
                    base_url: base_url.trim_end_matches('/').to_string(),
                },
                config.api_key_env.clone(),
            )
        };
        Ok(Self {
            client,
            endpoint,
            api_key_env,
        })
    }

    /// Chat completions URL for a model.
    fn url(&self, model: &str) -> String {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => format!("{base_url}/chat/completions"),
            Endpoint::Azure {
                endpoint,
                api_version,
            } => format!(
                "{endpoint}/openai/deployments/{model}/chat/completions?api-version={api_version}"
            ),
        }
    }

    /// Hosted endpoints need a key; a custom base URL (e.g. a local server) may not.
    fn requires_key(&self) -> bool {
        match &self.endpoint {
            Endpoint::OpenAi { base_url } => base_url == DEFAULT_BASE_URL,
            Endpoint::Azure { .. } => true,
        }
    }

    /// Draft a report for the job from the gathered findings.
    pub async fn draft(
        &self,
        job: &ResearchJob,
        findings: &ResearchFindings,
    ) -> Result<String, EngineError> {
        let api_key = api_key_from_env(&self.api_key_env);
        if api_key.is_none() && self.requires_key() {
            return Err(EngineError::Configuration {
                message: format!("{} is not set", self.api_key_env),
            });
        }

        let model = model_name(&job.settings.smart_llm);
        let url = self.url(model);
        let body = request_body(model, job, findings);
        debug!(url = %url, model, "Sending chat completion request");

        let request = self.client.post(&url).json(&body);
        let request = match (&self.endpoint, api_key) {
            (Endpoint::OpenAi { .. }, Some(key)) => request.bearer_auth(key),
            (Endpoint::Azure { .. }, Some(key)) => request.header("api-key", key),
            (_, None) => request,
        };
        let response = request.send().await.map_err(|e| EngineError::Provider {
            message: format!("chat request failed: {e}"),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| EngineError::Provider {
            message: format!("could not read chat response: {e}"),
        })?;
        if !status.is_success() {
            return Err(map_http_error(SERVICE, status, &text));
        }
        parse_completion(&text)
    }
}

/// Strip the `provider:` qualifier from a model name.
pub fn model_name(qualified: &str) -> &str {
    qualified
        .split_once(':')
        .map_or(qualified, |(_, model)| model)
}

fn report_instruction(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::ResearchReport => {
            "Write a well-structured research report of around 1,000 words."
        }
        ReportType::OutlineReport => {
            "Write a concise outline with headings and short bullet points."
        }
        ReportType::DetailedReport => {
            "Write an in-depth, detailed report with a section for each major subtopic."
        }
    }
}

/// Build the chat completions payload.
fn request_body(model: &str, job: &ResearchJob, findings: &ResearchFindings) -> Value {
    let settings = &job.settings;
    let mut system = format!(
        "{}\n\nFormat the report as {}.",
        settings.custom_prompt, settings.report_format
    );
    if settings.include_citations {
        system.push_str(" Cite sources inline using their [n] numbers.");
    } else {
        system.push_str(" Do not include citations.");
    }
    let user = format!(
        "{}\n\nResearch query: {}\n\nResearch findings:\n{}",
        report_instruction(job.report_type),
        job.query,
        findings.context
    );
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "temperature": 0.4,
        "stream": settings.stream,
    })
}

/// Extract the first choice's message text.
fn parse_completion(body: &str) -> Result<String, EngineError> {
    let parse_error = |message: String| EngineError::ResponseParse {
        service: SERVICE.to_string(),
        message,
    };
    let value: Value = serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))?;
    let content = value["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| parse_error("missing choices[0].message.content".into()))?;
    if content.trim().is_empty() {
        return Err(parse_error("empty report".into()));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MolarConfig;
    use crate::engines::MockResearchEngine;
    use crate::research::{ResearchOrchestrator, ResearchRequest};
    use std::sync::Arc;

    fn job() -> ResearchJob {
        let orch = ResearchOrchestrator::from_config(
            &MolarConfig::default(),
            Arc::new(MockResearchEngine::new()),
        );
        orch.prepare(&ResearchRequest::new("dry socket")).job
    }

    #[test]
    fn test_model_name() {
        assert_eq!(model_name("openai:gpt-4o"), "gpt-4o");
        assert_eq!(model_name("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_openai_url() {
        let writer = ChatWriter::new(Client::new(), &LlmConfig::default()).unwrap();
        assert_eq!(
            writer.url("gpt-4o"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_azure_url() {
        let mut config = LlmConfig::default();
        config.provider = "azure".into();
        config.azure.endpoint = Some("https://dental.openai.azure.com/".into());
        let writer = ChatWriter::new(Client::new(), &config).unwrap();
        assert_eq!(
            writer.url("gpt-4o"),
            "https://dental.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-05-01-preview"
        );
    }

    #[test]
    fn test_local_base_url_needs_no_key() {
        let hosted = ChatWriter::new(Client::new(), &LlmConfig::default()).unwrap();
        assert!(hosted.requires_key());

        let mut config = LlmConfig::default();
        config.base_url = Some("http://localhost:11434/v1/".into());
        let local = ChatWriter::new(Client::new(), &config).unwrap();
        assert!(!local.requires_key());
        assert_eq!(local.url("llama3.1:8b"), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_azure_requires_endpoint() {
        let mut config = LlmConfig::default();
        config.provider = "azure".into();
        let err = ChatWriter::new(Client::new(), &config).unwrap_err();
        assert!(matches!(err, EngineError::Configuration { .. }));
    }

    #[test]
    fn test_request_body() {
        let job = job();
        let findings = ResearchFindings {
            context: "[1] NHS (https://nhs.uk)\nDry socket advice".into(),
            sources: None,
        };
        let body = request_body("gpt-4o", &job, &findings);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], false);
        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.starts_with(&job.settings.custom_prompt));
        assert!(system.contains("Cite sources"));
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("Dry socket advice"));
        assert!(user.contains(&job.query));
    }

    #[test]
    fn test_parse_completion() {
        let body = r##"{"choices":[{"message":{"role":"assistant","content":"# Dry socket\n\nText."}}]}"##;
        assert_eq!(parse_completion(body).unwrap(), "# Dry socket\n\nText.");
    }

    #[test]
    fn test_parse_completion_errors() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(EngineError::ResponseParse { .. })
        ));
        assert!(parse_completion(r#"{"choices":[{"message":{"content":"  "}}]}"#).is_err());
        assert!(parse_completion("not json").is_err());
    }
}
