//! Incoming research request and its validation rules.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Smallest accepted `sources_count`.
pub const MIN_SOURCES: u32 = 5;
/// Largest accepted `sources_count`.
pub const MAX_SOURCES: u32 = 20;
/// Source cap applied by the professional shortcut.
pub const PROFESSIONAL_MAX_SOURCES: i64 = 15;
/// Longest accepted topic, in characters.
pub const MAX_TOPIC_CHARS: usize = 500;
/// Prepended to the topic by the professional shortcut.
pub const PROFESSIONAL_TOPIC_PREFIX: &str = "clinical evidence systematic review meta-analysis ";

const DEFAULT_SOURCES: i64 = 10;

/// Kind of report the engine should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    ResearchReport,
    OutlineReport,
    DetailedReport,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResearchReport => "research_report",
            Self::OutlineReport => "outline_report",
            Self::DetailedReport => "detailed_report",
        }
    }
}

/// Who the draft is written for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    #[default]
    General,
    Professional,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Professional => "professional",
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingLevel {
    Basic,
    #[default]
    Intermediate,
    Advanced,
}

impl ReadingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for ReadingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_sources_count() -> i64 {
    DEFAULT_SOURCES
}

fn default_true() -> bool {
    true
}

/// A research request as posted by the frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Free-text topic to research.
    pub topic: String,
    #[serde(default)]
    pub report_type: ReportType,
    /// Requested number of sources. Kept signed so out-of-range values
    /// reach validation instead of failing deserialization.
    #[serde(default = "default_sources_count")]
    pub sources_count: i64,
    /// Bias the search toward the trusted medical domains.
    #[serde(default = "default_true")]
    pub focus_medical: bool,
    #[serde(default = "default_true")]
    pub include_citations: bool,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub reading_level: ReadingLevel,
}

impl ResearchRequest {
    /// A request for `topic` with every other field at its default.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            report_type: ReportType::default(),
            sources_count: DEFAULT_SOURCES,
            focus_medical: true,
            include_citations: true,
            audience: Audience::default(),
            reading_level: ReadingLevel::default(),
        }
    }

    /// Check every field against its declared bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.topic.trim().is_empty() {
            return Err(ValidationError::EmptyTopic);
        }
        if self.topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(ValidationError::TopicTooLong {
                max: MAX_TOPIC_CHARS,
            });
        }
        if self.sources_count < MIN_SOURCES as i64 || self.sources_count > MAX_SOURCES as i64 {
            return Err(ValidationError::SourcesCountOutOfRange {
                value: self.sources_count,
                min: MIN_SOURCES,
                max: MAX_SOURCES,
            });
        }
        Ok(())
    }

    /// `sources_count` clamped into `[MIN_SOURCES, MAX_SOURCES]`.
    pub fn source_budget(&self) -> u32 {
        self.sources_count
            .clamp(MIN_SOURCES as i64, MAX_SOURCES as i64) as u32
    }

    /// Rewrite this request for the professional shortcut: medical focus is
    /// forced on, the source count capped, and the topic steered toward
    /// clinical evidence.
    pub fn into_professional(mut self) -> Self {
        self.focus_medical = true;
        self.sources_count = self.sources_count.min(PROFESSIONAL_MAX_SOURCES);
        self.topic = format!("{PROFESSIONAL_TOPIC_PREFIX}{}", self.topic);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let req: ResearchRequest = serde_json::from_str(r#"{"topic": "gum disease"}"#).unwrap();
        assert_eq!(req.report_type, ReportType::ResearchReport);
        assert_eq!(req.sources_count, 10);
        assert!(req.focus_medical);
        assert!(req.include_citations);
        assert_eq!(req.audience, Audience::General);
        assert_eq!(req.reading_level, ReadingLevel::Intermediate);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_unknown_audience_is_rejected() {
        let parsed =
            serde_json::from_str::<ResearchRequest>(r#"{"topic": "x", "audience": "children"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_validate_empty_topic() {
        let req = ResearchRequest::new("   ");
        assert_eq!(req.validate(), Err(ValidationError::EmptyTopic));
    }

    #[test]
    fn test_validate_long_topic() {
        let req = ResearchRequest::new("a".repeat(MAX_TOPIC_CHARS + 1));
        assert_eq!(
            req.validate(),
            Err(ValidationError::TopicTooLong {
                max: MAX_TOPIC_CHARS
            })
        );
    }

    #[test]
    fn test_validate_sources_bounds() {
        let mut req = ResearchRequest::new("fluoride");
        for ok in [5, 12, 20] {
            req.sources_count = ok;
            assert!(req.validate().is_ok(), "{ok} should be accepted");
        }
        for bad in [-1, 0, 4, 21, 100] {
            req.sources_count = bad;
            assert!(req.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_source_budget_clamps() {
        let mut req = ResearchRequest::new("fluoride");
        req.sources_count = 2;
        assert_eq!(req.source_budget(), 5);
        req.sources_count = 99;
        assert_eq!(req.source_budget(), 20);
        req.sources_count = 12;
        assert_eq!(req.source_budget(), 12);
    }

    #[test]
    fn test_into_professional() {
        let mut req = ResearchRequest::new("caries");
        req.sources_count = 18;
        req.focus_medical = false;
        let pro = req.into_professional();
        assert_eq!(
            pro.topic,
            "clinical evidence systematic review meta-analysis caries"
        );
        assert_eq!(pro.sources_count, 15);
        assert!(pro.focus_medical);
    }

    #[test]
    fn test_into_professional_keeps_smaller_counts() {
        let mut req = ResearchRequest::new("caries");
        req.sources_count = 7;
        assert_eq!(req.into_professional().sources_count, 7);
    }
}
