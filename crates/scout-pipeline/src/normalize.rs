//! Query normalization for both entry points.
//!
//! The structured endpoint sends an explicit filter; the conversational
//! endpoint sends a free-form utterance that is classified first (LLM with
//! keyword fallback). Both paths converge on [`PlaceQuery`], the canonical
//! shape everything downstream consumes.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument};

use scout_core::models::PlaceQuery;
use scout_core::{defaults, Error, GenerationBackend, Result};
use scout_inference::{simple_reply, Intent, IntentClassifier};

/// Validation message for a filter missing its mandatory fields.
pub const MISSING_PARAMS: &str = "Missing required parameters: city and category";

/// Wire shape of a structured search request. Everything is optional at the
/// parse layer; [`normalize_filter`] decides what is actually required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub vibe_tags: Option<TagsInput>,
    #[serde(default)]
    pub min_results: Option<i64>,
}

/// `vibe_tags` accepts either a list or a bare string; clients routinely
/// send `"cozy"` where `["cozy"]` is meant.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    One(String),
    Many(Vec<String>),
}

impl TagsInput {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            TagsInput::One(tag) => vec![tag],
            TagsInput::Many(tags) => tags,
        }
    }
}

/// Validate a structured filter and build the canonical query.
///
/// `city` and `category` are mandatory; `min_results` must be at least 1
/// when given and defaults to [`defaults::MIN_RESULTS`]. Tag casing and
/// dedup rules live in [`PlaceQuery::new`].
pub fn normalize_filter(request: FilterRequest) -> Result<PlaceQuery> {
    let city = request.city.as_deref().unwrap_or("").trim();
    let category = request.category.as_deref().unwrap_or("").trim();
    if city.is_empty() || category.is_empty() {
        return Err(Error::InvalidInput(MISSING_PARAMS.to_string()));
    }

    let min_results = match request.min_results {
        None => defaults::MIN_RESULTS,
        Some(n) if n >= 1 => n as usize,
        Some(n) => {
            return Err(Error::InvalidInput(format!(
                "min_results must be at least 1, got {}",
                n
            )))
        }
    };

    let vibe_tags = request
        .vibe_tags
        .map(TagsInput::into_vec)
        .unwrap_or_default();

    Ok(PlaceQuery::new(city, category, &vibe_tags, min_results))
}

/// What an utterance resolved to.
#[derive(Debug, Clone)]
pub enum NormalizedQuery {
    /// Run the fallback search pipeline.
    Search(PlaceQuery),
    /// Look up one already-known place by name.
    Detail { name: String },
    /// Conversational filler; answer with `reply` and touch nothing.
    SmallTalk { reply: String },
}

/// Classifies free-form utterances into [`NormalizedQuery`] values.
pub struct QueryNormalizer {
    classifier: IntentClassifier,
}

impl QueryNormalizer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            classifier: IntentClassifier::new(backend),
        }
    }

    /// Resolve one utterance.
    ///
    /// Search intents with missing fields become wildcard queries (empty
    /// `city`/`category` match anything); this is the only path that
    /// produces wildcards. Fails with [`Error::AmbiguousIntent`] when
    /// neither the classifier nor the keyword fallback extracts anything
    /// usable.
    #[instrument(skip(self), fields(subsystem = "pipeline", component = "normalizer", op = "normalize_utterance"))]
    pub async fn normalize_utterance(&self, utterance: &str) -> Result<NormalizedQuery> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(Error::InvalidInput("utterance must not be empty".to_string()));
        }

        let classification = self.classifier.classify(utterance).await?;
        let data = classification.extracted_data;

        match classification.intent {
            Intent::SimpleResponse => {
                let reply = match data.response_text.filter(|t| !t.trim().is_empty()) {
                    Some(text) => text,
                    None => simple_reply(&utterance.to_lowercase()).to_string(),
                };
                Ok(NormalizedQuery::SmallTalk { reply })
            }
            Intent::PlaceDetail => match data.place_name.filter(|n| !n.trim().is_empty()) {
                Some(name) => Ok(NormalizedQuery::Detail {
                    name: name.trim().to_string(),
                }),
                None => Err(Error::AmbiguousIntent(
                    "detail request without a place name".to_string(),
                )),
            },
            Intent::PlaceSearch => {
                let city = data.city.unwrap_or_default();
                let category = data.category.unwrap_or_default();
                let query = PlaceQuery::new(&city, &category, &data.vibe_tags, defaults::MIN_RESULTS);
                info!(
                    city = %query.city,
                    category = %query.category,
                    tag_count = query.vibe_tags.len(),
                    "Utterance normalized to search"
                );
                Ok(NormalizedQuery::Search(query))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_inference::MockGenerationBackend;

    fn filter(city: Option<&str>, category: Option<&str>) -> FilterRequest {
        FilterRequest {
            city: city.map(String::from),
            category: category.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_filter_defaults() {
        let query = normalize_filter(filter(Some("Delhi"), Some("Cafe"))).unwrap();
        assert_eq!(query.city, "delhi");
        assert_eq!(query.category, "cafe");
        assert!(query.vibe_tags.is_empty());
        assert_eq!(query.min_results, defaults::MIN_RESULTS);
    }

    #[test]
    fn test_normalize_filter_rejects_missing_fields() {
        for request in [
            filter(None, Some("cafe")),
            filter(Some("delhi"), None),
            filter(Some("  "), Some("cafe")),
            filter(None, None),
        ] {
            let err = normalize_filter(request).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid input: {}", MISSING_PARAMS));
        }
    }

    #[test]
    fn test_normalize_filter_rejects_min_results_below_one() {
        for bad in [0, -3] {
            let request = FilterRequest {
                min_results: Some(bad),
                ..filter(Some("delhi"), Some("cafe"))
            };
            assert!(matches!(
                normalize_filter(request),
                Err(Error::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_normalize_filter_coerces_bare_tag_string() {
        let request = FilterRequest {
            vibe_tags: Some(TagsInput::One("  Cozy ".to_string())),
            ..filter(Some("delhi"), Some("cafe"))
        };
        let query = normalize_filter(request).unwrap();
        assert_eq!(query.vibe_tags, vec!["cozy"]);
    }

    #[test]
    fn test_filter_request_parses_string_and_list_tags() {
        let from_string: FilterRequest = serde_json::from_str(
            r#"{"city": "Delhi", "category": "cafe", "vibe_tags": "aesthetic"}"#,
        )
        .unwrap();
        let query = normalize_filter(from_string).unwrap();
        assert_eq!(query.vibe_tags, vec!["aesthetic"]);

        let from_list: FilterRequest = serde_json::from_str(
            r#"{"city": "Delhi", "category": "cafe", "vibe_tags": ["Aesthetic", "cozy", "aesthetic"], "min_results": 2}"#,
        )
        .unwrap();
        let query = normalize_filter(from_list).unwrap();
        assert_eq!(query.vibe_tags, vec!["aesthetic", "cozy"]);
        assert_eq!(query.min_results, 2);
    }

    #[tokio::test]
    async fn test_normalize_utterance_search_intent() {
        let backend = MockGenerationBackend::new().with_response_for(
            "coffee shops in Delhi",
            r#"{"intent": "place_search", "confidence": 0.95, "extracted_data": {"city": "Delhi", "category": "coffee", "vibe_tags": ["cozy"]}}"#,
        );
        let normalizer = QueryNormalizer::new(Arc::new(backend));

        let normalized = normalizer
            .normalize_utterance("coffee shops in Delhi")
            .await
            .unwrap();
        match normalized {
            NormalizedQuery::Search(query) => {
                assert_eq!(query.city, "delhi");
                assert_eq!(query.category, "coffee");
                assert_eq!(query.vibe_tags, vec!["cozy"]);
                assert_eq!(query.min_results, defaults::MIN_RESULTS);
            }
            other => panic!("Expected Search, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_normalize_utterance_detail_intent() {
        let backend = MockGenerationBackend::new().with_response_for(
            "tell me about Blue Tokai",
            r#"{"intent": "place_detail", "confidence": 0.9, "extracted_data": {"place_name": "Blue Tokai"}}"#,
        );
        let normalizer = QueryNormalizer::new(Arc::new(backend));

        let normalized = normalizer
            .normalize_utterance("tell me about Blue Tokai")
            .await
            .unwrap();
        match normalized {
            NormalizedQuery::Detail { name } => assert_eq!(name, "Blue Tokai"),
            other => panic!("Expected Detail, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_normalize_utterance_detail_without_name_is_ambiguous() {
        let backend = MockGenerationBackend::new().with_fixed_response(
            r#"{"intent": "place_detail", "confidence": 0.9, "extracted_data": {}}"#,
        );
        let normalizer = QueryNormalizer::new(Arc::new(backend));

        let err = normalizer
            .normalize_utterance("tell me about it")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousIntent(_)));
    }

    #[tokio::test]
    async fn test_normalize_utterance_small_talk_uses_model_text() {
        let backend = MockGenerationBackend::new().with_fixed_response(
            r#"{"intent": "simple_response", "confidence": 1.0, "extracted_data": {"response_text": "Hello! How can I help?"}}"#,
        );
        let normalizer = QueryNormalizer::new(Arc::new(backend));

        match normalizer.normalize_utterance("hello").await.unwrap() {
            NormalizedQuery::SmallTalk { reply } => assert_eq!(reply, "Hello! How can I help?"),
            other => panic!("Expected SmallTalk, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_normalize_utterance_small_talk_canned_fallback() {
        let backend = MockGenerationBackend::new().with_fixed_response(
            r#"{"intent": "simple_response", "confidence": 1.0, "extracted_data": {}}"#,
        );
        let normalizer = QueryNormalizer::new(Arc::new(backend));

        match normalizer.normalize_utterance("thanks").await.unwrap() {
            NormalizedQuery::SmallTalk { reply } => assert!(!reply.is_empty()),
            other => panic!("Expected SmallTalk, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_normalize_utterance_empty_rejected() {
        let normalizer = QueryNormalizer::new(Arc::new(MockGenerationBackend::new()));
        let err = normalizer.normalize_utterance("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_normalize_utterance_backend_down_uses_keywords() {
        let backend = MockGenerationBackend::new().with_failure(true);
        let normalizer = QueryNormalizer::new(Arc::new(backend));

        match normalizer
            .normalize_utterance("cafes in delhi")
            .await
            .unwrap()
        {
            NormalizedQuery::Search(query) => {
                assert_eq!(query.city, "delhi");
                assert_eq!(query.category, "cafe");
            }
            other => panic!("Expected Search, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_normalize_utterance_backend_down_and_no_keywords_is_ambiguous() {
        let backend = MockGenerationBackend::new().with_failure(true);
        let normalizer = QueryNormalizer::new(Arc::new(backend));

        let err = normalizer
            .normalize_utterance("xyzzy plugh")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousIntent(_)));
    }
}
