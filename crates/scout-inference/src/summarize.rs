//! Vibe extraction from harvested review snippets.
//!
//! [`VibeSummarizer`] turns a place's review snippets into a [`VibeSummary`]
//! via one JSON-mode generation call. Summarization is strictly best-effort:
//! any failure (backend error, unparseable output) yields the empty summary
//! so the place still persists with its reviews.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use scout_core::defaults;
use scout_core::models::{normalize_tags, truncate_chars, Review, VibeSummary};
use scout_core::GenerationBackend;

/// Best-effort review-to-vibe summarizer.
pub struct VibeSummarizer {
    backend: Arc<dyn GenerationBackend>,
}

impl VibeSummarizer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Summarize one place's snippets.
    ///
    /// Returns [`VibeSummary::empty`] when there is nothing to summarize or
    /// the model output is unusable. Never errors.
    #[instrument(skip(self, reviews), fields(subsystem = "inference", component = "summarizer", op = "summarize", place_name = %place_name, snippet_count = reviews.len()))]
    pub async fn summarize(
        &self,
        place_name: &str,
        category: &str,
        reviews: &[Review],
    ) -> VibeSummary {
        if reviews.is_empty() {
            return VibeSummary::empty();
        }

        let prompt = build_prompt(place_name, category, &combine_snippets(reviews));

        let raw = match self.backend.generate_json(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    degrade_reason = "summarize_failed",
                    error = %e,
                    "Generation failed, persisting without summary"
                );
                return VibeSummary::empty();
            }
        };

        match parse_summary(&raw) {
            Some(parsed) => {
                let summary = finalize(parsed, reviews);
                debug!(
                    tag_count = summary.vibe_tags.len(),
                    citation_count = summary.citations.len(),
                    "Summarization complete"
                );
                summary
            }
            None => {
                warn!(
                    degrade_reason = "summarize_failed",
                    response_len = raw.len(),
                    "No JSON object in model output, persisting without summary"
                );
                VibeSummary::empty()
            }
        }
    }
}

/// Join snippet contents, capped at the model input budget.
fn combine_snippets(reviews: &[Review]) -> String {
    let combined = reviews
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&combined, defaults::SUMMARY_INPUT_MAX_CHARS)
}

fn build_prompt(place_name: &str, category: &str, snippets: &str) -> String {
    format!(
        r#"You are a helpful assistant that analyzes reviews to extract vibe information about places.

Analyze the following reviews for {place_name} (a {category}) and extract:

1. A concise summary (2-3 sentences) of the overall vibe and experience
2. 3-5 vibe tags that describe the atmosphere (e.g., "cozy", "aesthetic", "vibrant", "quiet", "romantic")
3. 2-3 relevant emojis that represent the place

Reviews:
{snippets}

Respond in this exact JSON format:
{{
    "summary": "Brief summary of the place's vibe and experience",
    "vibe_tags": ["tag1", "tag2", "tag3"],
    "emojis": ["emoji1", "emoji2"]
}}

Only return the JSON, no additional text."#
    )
}

/// Raw model output shape.
#[derive(Deserialize)]
struct RawSummary {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    vibe_tags: Vec<String>,
    #[serde(default)]
    emojis: Vec<String>,
}

/// Extract and parse the first JSON object in the model output.
///
/// Models occasionally wrap the object in prose or code fences even in JSON
/// mode; slicing from the first `{` to the last `}` recovers those cases.
fn parse_summary(raw: &str) -> Option<RawSummary> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

/// Normalize model output into the persisted summary shape and attach
/// citations from the snippets the model actually saw.
///
/// A response with no usable field at all counts as a failed summarization,
/// not as evidence, so it carries no citations either.
fn finalize(parsed: RawSummary, reviews: &[Review]) -> VibeSummary {
    let mut vibe_tags = normalize_tags(&parsed.vibe_tags);
    vibe_tags.truncate(defaults::VIBE_TAGS_MAX);

    let mut emojis: Vec<String> = parsed
        .emojis
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    emojis.truncate(defaults::EMOJIS_MAX);

    let summary = parsed.summary.trim().to_string();

    if summary.is_empty() && vibe_tags.is_empty() && emojis.is_empty() {
        return VibeSummary::empty();
    }

    VibeSummary {
        vibe_tags,
        emojis,
        summary,
        citations: citations_from(reviews),
    }
}

/// First distinct non-empty snippet URLs, in snippet order.
fn citations_from(reviews: &[Review]) -> Vec<String> {
    let mut citations: Vec<String> = Vec::new();
    for review in reviews {
        if review.url.is_empty() || citations.iter().any(|c| c == &review.url) {
            continue;
        }
        citations.push(review.url.clone());
        if citations.len() == defaults::CITATIONS_MAX {
            break;
        }
    }
    citations
}
