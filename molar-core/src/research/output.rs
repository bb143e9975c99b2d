//! Research response shaping and draft document rendering.

use super::orchestrator::ResearchResult;
use super::request::{Audience, ReadingLevel, ReportType, ResearchRequest};
use super::sources::SourceRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category assigned to every generated draft.
pub const DRAFT_CATEGORY: &str = "dental-problems";

const SOURCES_HEADING: &str = "## Sources";
const SNIPPET_INDENT: &str = "   ";
const REVIEW_NOTE: &str = "**Note:** This is an AI-generated draft based on web research. \
                           It requires professional medical review before publication.";

/// Summary figures echoed back with a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchMetadata {
    pub report_type: ReportType,
    /// Number of sources actually returned.
    pub sources_count: usize,
    pub medical_focus: bool,
    /// Whitespace-delimited tokens in the report.
    pub word_count: usize,
    pub audience: Audience,
    pub reading_level: ReadingLevel,
}

/// The structured response for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub topic: String,
    pub report: String,
    pub sources: Vec<SourceRecord>,
    pub metadata: ResearchMetadata,
    pub generated_at: DateTime<Utc>,
}

impl ResearchResponse {
    /// Project a result plus the request echo into a response.
    pub fn from_result(request: &ResearchRequest, result: ResearchResult) -> Self {
        let metadata = ResearchMetadata {
            report_type: request.report_type,
            sources_count: result.sources.len(),
            medical_focus: request.focus_medical,
            word_count: word_count(&result.report),
            audience: request.audience,
            reading_level: request.reading_level,
        };
        Self {
            topic: request.topic.clone(),
            report: result.report,
            sources: result.sources,
            metadata,
            generated_at: result.generated_at,
        }
    }
}

/// Count whitespace-delimited tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a response as a publishable markdown draft: front matter, the
/// report body unchanged, a numbered sources section, and a review note.
pub fn render_document(response: &ResearchResponse) -> String {
    let topic = &response.topic;
    let meta = &response.metadata;
    let generated_at = response.generated_at.to_rfc3339();

    let tags = ["AI-generated", "draft", "research", meta.audience.as_str(), meta.reading_level.as_str()]
        .iter()
        .map(|t| quoted(t))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("title: {}\n", quoted(&format!("Draft: {topic}"))));
    out.push_str(&format!(
        "excerpt: {}\n",
        quoted(&format!("An AI-generated research report on {topic}."))
    ));
    out.push_str(&format!("category: {}\n", quoted(DRAFT_CATEGORY)));
    out.push_str(&format!("tags: [{tags}]\n"));
    out.push_str("status: \"draft\"\n");
    out.push_str("featured: false\n");
    out.push_str("reviewed: false\n");
    out.push_str(&format!("audience: {}\n", quoted(meta.audience.as_str())));
    out.push_str(&format!("readingLevel: {}\n", quoted(meta.reading_level.as_str())));
    out.push_str(&format!("generatedAt: {}\n", quoted(&generated_at)));
    out.push_str("---\n\n");

    out.push_str(&response.report);

    out.push_str(&format!("\n\n{SOURCES_HEADING}\n\n"));
    let entries: Vec<String> = response
        .sources
        .iter()
        .enumerate()
        .map(|(i, s)| source_entry(i + 1, s))
        .collect();
    out.push_str(&entries.join("\n\n"));

    out.push_str("\n\n---\n\n");
    out.push_str(REVIEW_NOTE);
    out.push_str(&format!(
        "\n**Generated:** {}\n**Word Count:** {}\n",
        response.generated_at.format("%-d %B %Y, %H:%M UTC"),
        meta.word_count
    ));
    out
}

/// A numbered link line, then the snippet with every line indented under it.
fn source_entry(number: usize, source: &SourceRecord) -> String {
    let mut entry = format!("{number}. [{}]({})", source.title, source.url);
    if !source.snippet.is_empty() {
        for line in source.snippet.split('\n') {
            entry.push('\n');
            entry.push_str(SNIPPET_INDENT);
            entry.push_str(line);
        }
    }
    entry
}

/// Recover the numbered sources from a rendered draft, in order.
pub fn parse_sources(document: &str) -> Vec<SourceRecord> {
    let Some(start) = document.rfind(&format!("\n{SOURCES_HEADING}\n")) else {
        return Vec::new();
    };
    let section = &document[start + SOURCES_HEADING.len() + 2..];
    let section = section.split("\n---\n").next().unwrap_or_default();

    let mut records = Vec::new();
    let mut lines = section.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(link) = parse_link_line(line) else {
            continue;
        };
        let mut snippet: Vec<&str> = Vec::new();
        while let Some(text) = lines.peek().copied().and_then(|next| next.strip_prefix(SNIPPET_INDENT)) {
            snippet.push(text);
            lines.next();
        }
        records.push(SourceRecord {
            snippet: snippet.join("\n"),
            ..link
        });
    }
    records
}

/// Parse `N. [title](url)`.
fn parse_link_line(line: &str) -> Option<SourceRecord> {
    let (number, rest) = line.split_once(". [")?;
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let rest = rest.strip_suffix(')')?;
    let split = rest.rfind("](")?;
    Some(SourceRecord {
        title: rest[..split].to_string(),
        url: rest[split + 2..].to_string(),
        snippet: String::new(),
    })
}
