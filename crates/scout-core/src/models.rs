//! Core data models for vibescout.
//!
//! These types are shared across all vibescout crates and represent the
//! canonical entities flowing through the fallback search pipeline: the
//! query, the raw directory candidate, the harvested review snippet, the
//! derived vibe summary, and the persisted place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Canonical search query, immutable once constructed.
///
/// `city` and `category` are stored lowercased; an empty string means
/// "match any value" (only the utterance path produces wildcards, the
/// structured path rejects them). `vibe_tags` are trimmed, lowercased and
/// deduplicated, preserving first-seen order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceQuery {
    pub city: String,
    pub category: String,
    pub vibe_tags: Vec<String>,
    pub min_results: usize,
}

impl PlaceQuery {
    /// Build a query, applying the canonical casing/trim rules.
    pub fn new<S: AsRef<str>>(
        city: &str,
        category: &str,
        vibe_tags: &[S],
        min_results: usize,
    ) -> Self {
        Self {
            city: city.trim().to_lowercase(),
            category: category.trim().to_lowercase(),
            vibe_tags: normalize_tags(vibe_tags),
            min_results: min_results.max(1),
        }
    }

    /// True when the place satisfies every filter of this query.
    ///
    /// This is the single matching rule shared by all store implementations.
    /// City equality, category substring and tag intersection are all
    /// case-insensitive, and empty query fields match anything.
    pub fn matches(&self, place: &Place) -> bool {
        city_matches(&place.original.city, &self.city)
            && category_matches(&place.original.category, &self.category)
            && tags_match(&place.processed.vibe_tags, &self.vibe_tags)
    }
}

/// Case-insensitive city equality; empty `wanted` matches anything.
pub fn city_matches(stored: &str, wanted: &str) -> bool {
    wanted.is_empty() || stored.trim().eq_ignore_ascii_case(wanted)
}

/// Case-insensitive substring match on category; empty `wanted` matches
/// anything. Deliberately a plain substring rule, not a fuzzy matcher.
pub fn category_matches(stored: &str, wanted: &str) -> bool {
    wanted.is_empty() || stored.to_lowercase().contains(&wanted.to_lowercase())
}

/// True when `stored` intersects `wanted` (case-insensitive), or `wanted`
/// is empty.
pub fn tags_match(stored: &[String], wanted: &[String]) -> bool {
    wanted.is_empty()
        || stored
            .iter()
            .any(|s| wanted.iter().any(|w| s.eq_ignore_ascii_case(w)))
}

/// Trim, lowercase, drop empties, and deduplicate preserving order.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let t = tag.as_ref().trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

// =============================================================================
// PLACE TYPES
// =============================================================================

/// Geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Immutable descriptive facts about a place, set once at creation and
/// never rewritten by enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrigin {
    pub name: String,
    pub category: String,
    pub address: String,
    pub locality: String,
    pub city: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub coordinates: Coordinates,
}

/// Review-derived metadata. Empty until an enrichment pass succeeds;
/// merged forward on re-enrichment (tags union, never replaced).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VibeSummary {
    #[serde(default)]
    pub vibe_tags: Vec<String>,
    #[serde(default)]
    pub emojis: Vec<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub citations: Vec<String>,
}

impl VibeSummary {
    /// The "enrichment failed" value: all fields empty.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.vibe_tags.is_empty()
            && self.emojis.is_empty()
            && self.summary.is_empty()
            && self.citations.is_empty()
    }
}

/// One harvested review snippet, also the persisted review shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub source: String,
    pub content: String,
    pub url: String,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Identity used for append-dedup on merge.
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.source, &self.url)
    }
}

/// The persisted, enriched entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: Uuid,
    /// Unique key assigned by whichever supplier first produced the place.
    pub external_id: String,
    pub original: PlaceOrigin,
    pub processed: VibeSummary,
    pub reviews: Vec<Review>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Place {
    /// Compose a fresh place from a directory candidate.
    ///
    /// `original.city` is stamped from the query city, not the directory's
    /// municipality field, so newly enriched places are findable by the
    /// query that triggered the fallback. The municipality survives as
    /// `locality`.
    pub fn from_candidate(candidate: &RawCandidate, city: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            external_id: candidate.external_id.clone(),
            original: PlaceOrigin {
                name: candidate.name.clone(),
                category: candidate.category.clone(),
                address: candidate.address.clone(),
                locality: candidate.locality.clone(),
                city: city.trim().to_lowercase(),
                country: candidate.country.clone(),
                photo_url: candidate.photo_url.clone(),
                coordinates: candidate.coordinates,
            },
            processed: VibeSummary::empty(),
            reviews: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a re-enrichment of the same place into this stored record.
    ///
    /// `original` is kept untouched. `reviews` append-dedup by
    /// `(source, url)`. `vibe_tags` become an ordered union. Non-empty
    /// incoming `summary`/`emojis`/`citations` replace the stored values;
    /// empty incoming values leave them alone. Idempotent: merging the
    /// same input twice equals merging it once.
    pub fn merge_from(&mut self, incoming: Place) {
        merge_reviews(&mut self.reviews, incoming.reviews);
        merge_tags(&mut self.processed.vibe_tags, incoming.processed.vibe_tags);
        if !incoming.processed.summary.is_empty() {
            self.processed.summary = incoming.processed.summary;
        }
        if !incoming.processed.emojis.is_empty() {
            self.processed.emojis = incoming.processed.emojis;
        }
        if !incoming.processed.citations.is_empty() {
            self.processed.citations = incoming.processed.citations;
        }
        self.updated_at = Utc::now();
    }
}

/// Append `incoming` reviews, dropping duplicates by `(source, url)` and
/// truncating content to the write limit. Never removes existing entries.
pub fn merge_reviews(existing: &mut Vec<Review>, incoming: Vec<Review>) {
    for mut review in incoming {
        let duplicate = existing
            .iter()
            .any(|r| r.dedup_key() == review.dedup_key());
        if !duplicate {
            review.content = truncate_chars(&review.content, defaults::REVIEW_MAX_CONTENT_CHARS);
            existing.push(review);
        }
    }
}

/// Apply the write rules to a fresh review list: in-batch `(source, url)`
/// dedup plus content truncation. Stores call this before the first insert so
/// the rules hold even for places that never go through a merge.
pub fn sanitize_reviews(reviews: Vec<Review>) -> Vec<Review> {
    let mut out = Vec::new();
    merge_reviews(&mut out, reviews);
    out
}

/// Ordered union: appends tags not already present (case-insensitive).
pub fn merge_tags(existing: &mut Vec<String>, incoming: Vec<String>) {
    for tag in incoming {
        if !existing.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            existing.push(tag);
        }
    }
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// =============================================================================
// SUPPLIER TYPES
// =============================================================================

/// Raw place record from the external directory, not yet enriched or
/// persisted. Carries the directory's own location fields; the query city
/// is stamped on at composition time (`Place::from_candidate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub external_id: String,
    pub name: String,
    pub category: String,
    pub address: String,
    pub locality: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub coordinates: Coordinates,
}
