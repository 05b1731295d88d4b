//! Chat intent classification.
//!
//! Classifies a free-form utterance as a place search, a place detail
//! request, or small talk. The primary path is one JSON-mode generation
//! call; when the backend fails or returns garbage, a keyword fallback
//! covers the common phrasings. Only an utterance neither path can read
//! is an error ([`Error::AmbiguousIntent`]).

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use scout_core::{Error, GenerationBackend, Result};

/// Small-talk phrases matched on word boundaries.
const SIMPLE_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "how are you",
    "what can you do",
    "help",
    "thanks",
    "thank you",
];

/// Detail-request phrases; the place name is whatever follows the phrase.
const DETAIL_KEYWORDS: &[&str] = &[
    "tell me about",
    "what is",
    "what's at",
    "info about",
    "details of",
    "about",
];

/// Cities the keyword fallback recognizes.
const KNOWN_CITIES: &[&str] = &[
    "delhi",
    "mumbai",
    "bangalore",
    "chennai",
    "kolkata",
    "hyderabad",
    "pune",
    "ahmedabad",
];

/// Category keyword map for the fallback path.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("cafe", &["coffee", "cafe", "starbucks"]),
    ("restaurant", &["restaurant", "food", "dining", "eat"]),
    ("park", &["park", "garden", "outdoor"]),
    ("bar", &["bar", "pub", "nightlife"]),
    ("shopping", &["mall", "shop", "store", "shopping"]),
];

/// Classified intent of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PlaceSearch,
    PlaceDetail,
    SimpleResponse,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::PlaceSearch => "place_search",
            Intent::PlaceDetail => "place_detail",
            Intent::SimpleResponse => "simple_response",
        }
    }
}

/// Structured fields pulled out of the utterance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedData {
    #[serde(default)]
    pub place_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub vibe_tags: Vec<String>,
    #[serde(default)]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub response_text: Option<String>,
}

/// Classification result.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentClassification {
    pub intent: Intent,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub extracted_data: ExtractedData,
}

/// LLM-first utterance classifier with keyword fallback.
pub struct IntentClassifier {
    backend: Arc<dyn GenerationBackend>,
}

impl IntentClassifier {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Classify one utterance.
    #[instrument(skip(self), fields(subsystem = "inference", component = "intent", op = "classify"))]
    pub async fn classify(&self, utterance: &str) -> Result<IntentClassification> {
        let prompt = build_intent_prompt(utterance);

        match self.backend.generate_json(&prompt).await {
            Ok(raw) => {
                if let Some(classification) = parse_classification(&raw) {
                    info!(
                        intent = classification.intent.as_str(),
                        confidence = classification.confidence,
                        "Intent classified"
                    );
                    return Ok(classification);
                }
                warn!(
                    response_len = raw.len(),
                    "Unparseable intent output, using keyword fallback"
                );
            }
            Err(e) => {
                warn!(error = %e, "Intent generation failed, using keyword fallback");
            }
        }

        keyword_classification(utterance).ok_or_else(|| {
            Error::AmbiguousIntent(format!("Could not determine intent for: {}", utterance))
        })
    }
}

fn build_intent_prompt(utterance: &str) -> String {
    format!(
        r#"You are an intent classifier for a place discovery system. Analyze the user query and determine the intent.

User Query: "{utterance}"

Classify the intent as either:
1. "place_search" - User wants to search for places (e.g., "coffee shops in Delhi", "restaurants near me", "parks in Mumbai")
2. "place_detail" - User wants details about a specific place (e.g., "tell me about Starbucks", "what's at Central Park", "info about Joe's Pizza")
3. "simple_response" - User wants a simple text response (e.g., "hello", "how are you", "what can you do")

Respond with a JSON object in this exact format:
{{
    "intent": "place_search" or "place_detail" or "simple_response",
    "confidence": 0.0-1.0,
    "extracted_data": {{
        "place_name": "specific place name if mentioned",
        "city": "city name if mentioned",
        "category": "restaurant/coffee/park/etc if mentioned",
        "vibe_tags": ["tag1", "tag2"] if mentioned,
        "search_terms": ["term1", "term2"] for place_search,
        "response_text": "simple response text for simple_response"
    }}
}}

Examples:
- "coffee shops in Delhi" → place_search with city=Delhi, category=coffee
- "tell me about Starbucks" → place_detail with place_name=Starbucks
- "hello" → simple_response with response_text="Hello! How can I help you find places today?"

Only return the JSON, no additional text."#
    )
}

/// Extract and parse the first JSON object in the model output.
fn parse_classification(raw: &str) -> Option<IntentClassification> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

/// Keyword-based fallback classification.
///
/// Returns `None` when no keyword, city, or category matches; callers turn
/// that into [`Error::AmbiguousIntent`].
pub fn keyword_classification(utterance: &str) -> Option<IntentClassification> {
    let lower = utterance.to_lowercase();

    for keyword in SIMPLE_KEYWORDS {
        if contains_phrase(&lower, keyword) {
            return Some(IntentClassification {
                intent: Intent::SimpleResponse,
                confidence: 0.8,
                extracted_data: ExtractedData {
                    response_text: Some(simple_reply(&lower).to_string()),
                    ..Default::default()
                },
            });
        }
    }

    for keyword in DETAIL_KEYWORDS {
        if let Some((_, end)) = find_phrase(&lower, keyword) {
            return Some(IntentClassification {
                intent: Intent::PlaceDetail,
                confidence: 0.7,
                extracted_data: ExtractedData {
                    place_name: remainder_name(utterance, &lower, end),
                    ..Default::default()
                },
            });
        }
    }

    let city = extract_city(&lower);
    let category = extract_category(&lower);
    if city.is_none() && category.is_none() {
        return None;
    }

    Some(IntentClassification {
        intent: Intent::PlaceSearch,
        confidence: 0.6,
        extracted_data: ExtractedData {
            city,
            category,
            search_terms: utterance.split_whitespace().map(String::from).collect(),
            ..Default::default()
        },
    })
}

/// Canned small-talk reply for an utterance (already lowercased).
pub fn simple_reply(lower: &str) -> &'static str {
    if ["hello", "hi", "hey"]
        .iter()
        .any(|kw| contains_phrase(lower, kw))
    {
        "Hello! How can I help you find places today?"
    } else if contains_phrase(lower, "how are you") {
        "I'm doing great! Ready to help you discover amazing places. What are you looking for?"
    } else if contains_phrase(lower, "what can you do") || contains_phrase(lower, "help") {
        "I can help you search for places and get details about specific locations! Try asking me to find coffee shops in Delhi or tell me about a specific place."
    } else if contains_phrase(lower, "thanks") || contains_phrase(lower, "thank you") {
        "You're welcome! Let me know if you need help finding more places."
    } else {
        "I'm here to help you discover places! You can ask me to search for places or get details about specific locations."
    }
}

/// Whole-phrase containment: the phrase must not sit inside a longer word
/// ("hi" must not match "delhi").
fn contains_phrase(text: &str, phrase: &str) -> bool {
    find_phrase(text, phrase).is_some()
}

/// Byte range of the first boundary-clean occurrence of `phrase`.
fn find_phrase(text: &str, phrase: &str) -> Option<(usize, usize)> {
    if phrase.is_empty() {
        return None;
    }
    let mut search_from = 0;
    while let Some(pos) = text[search_from..].find(phrase) {
        let start = search_from + pos;
        let end = start + phrase.len();

        let clean_before = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let clean_after = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if clean_before && clean_after {
            return Some((start, end));
        }
        search_from = end;
    }
    None
}

/// The place name is whatever follows the detail phrase, with punctuation
/// and quotes stripped. Original casing is preserved when byte offsets line
/// up between the utterance and its lowercased copy.
fn remainder_name(utterance: &str, lower: &str, end: usize) -> Option<String> {
    let source = if utterance.len() == lower.len() {
        utterance
    } else {
        lower
    };
    let name = source[end..]
        .trim()
        .trim_matches(|c: char| matches!(c, '?' | '!' | '.' | ',' | '"' | '\''))
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Recognize a known city in the utterance (already lowercased).
fn extract_city(lower: &str) -> Option<String> {
    KNOWN_CITIES
        .iter()
        .find(|city| contains_phrase(lower, city))
        .map(|city| title_case(city))
}

/// Recognize a category keyword in the utterance (already lowercased).
/// Category keywords are nouns, so a plain plural also counts
/// ("pubs" → bar, "restaurants" → restaurant).
fn extract_category(lower: &str) -> Option<String> {
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|kw| has_noun(lower, kw)) {
            return Some((*category).to_string());
        }
    }
    None
}

fn has_noun(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word || token.strip_suffix('s') == Some(word))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
