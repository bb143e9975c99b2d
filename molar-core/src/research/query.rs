//! Search query biasing and audience instruction lookup.

use super::request::{Audience, ResearchRequest};

/// Prepended to the engine query when writing for professionals.
const PROFESSIONAL_QUERY_PREFIX: &str = "clinical evidence ";

/// Writing instructions keyed by `(audience, reading_level)`.
const AUDIENCE_INSTRUCTIONS: [(&str, &str, &str); 6] = [
    (
        "general",
        "basic",
        "Write for members of the public with no medical background. Use short sentences, \
         everyday words, and explain any dental term the first time it appears. Focus on what \
         the reader can do at home and when they should see a dentist.",
    ),
    (
        "general",
        "intermediate",
        "Write for an informed general audience. Use clear, plain English, define technical \
         terms briefly, and balance practical advice with a short explanation of the underlying \
         causes and treatments.",
    ),
    (
        "general",
        "advanced",
        "Write for well-read lay readers who want depth. Use accurate clinical terminology with \
         brief definitions, discuss mechanisms and treatment options in detail, and summarise \
         what the research evidence does and does not show.",
    ),
    (
        "professional",
        "basic",
        "Write for dental care professionals such as nurses and hygienists. Use standard \
         clinical terminology, keep the structure practical, and highlight guidance that affects \
         day-to-day patient care.",
    ),
    (
        "professional",
        "intermediate",
        "Write for practising dentists. Use precise clinical language, summarise current \
         guidelines and the strength of the supporting evidence, and note implications for \
         diagnosis and treatment planning.",
    ),
    (
        "professional",
        "advanced",
        "Write for specialists and researchers. Critically appraise the evidence base, compare \
         study designs and outcomes, report effect sizes where available, and identify gaps and \
         controversies in the literature.",
    ),
];

/// Look up writing instructions for an audience and reading level.
///
/// Total over any pair of strings: unknown pairs fall back to
/// `("general", "intermediate")`.
pub fn audience_instructions(audience: &str, reading_level: &str) -> &'static str {
    AUDIENCE_INSTRUCTIONS
        .iter()
        .find(|(a, r, _)| *a == audience && *r == reading_level)
        .or_else(|| {
            AUDIENCE_INSTRUCTIONS
                .iter()
                .find(|(a, r, _)| *a == "general" && *r == "intermediate")
        })
        .map(|(_, _, text)| *text)
        .unwrap_or_default()
}

/// The engine-facing query plus the custom prompt for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Query sent to the engine, possibly prefixed and site-filtered.
    pub engine_query: String,
    /// Audience instruction block from the lookup table.
    pub audience_instruction: &'static str,
    /// Instruction block joined with the unmodified topic.
    pub custom_prompt: String,
}

/// Builds engine queries biased toward a fixed list of trusted domains.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    trusted_sources: Vec<String>,
}

impl QueryBuilder {
    /// Create a builder over the configured trusted domains.
    pub fn new(trusted_sources: Vec<String>) -> Self {
        Self { trusted_sources }
    }

    pub fn trusted_sources(&self) -> &[String] {
        &self.trusted_sources
    }

    /// `site:(a OR site:b OR site:c)` over every trusted domain, in order.
    pub fn site_filter(&self) -> String {
        format!("site:({})", self.trusted_sources.join(" OR site:"))
    }

    /// Derive the engine query from the topic.
    pub fn engine_query(&self, topic: &str, audience: Audience, focus_medical: bool) -> String {
        let mut query = topic.to_string();
        if audience == Audience::Professional {
            query = format!("{PROFESSIONAL_QUERY_PREFIX}{query}");
        }
        if focus_medical {
            query = format!("{query} {}", self.site_filter());
        }
        query
    }

    /// Build the full plan for a request.
    pub fn plan(&self, request: &ResearchRequest) -> QueryPlan {
        let audience_instruction = audience_instructions(
            request.audience.as_str(),
            request.reading_level.as_str(),
        );
        QueryPlan {
            engine_query: self.engine_query(
                &request.topic,
                request.audience,
                request.focus_medical,
            ),
            audience_instruction,
            custom_prompt: format!("{audience_instruction}\n\nTopic: {}", request.topic),
        }
    }
}
