//! Core traits for vibescout abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability. Only the
//! functional signatures and failure modes are contractual here; each
//! collaborator's transport and auth details stay inside its adapter.

use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Place, PlaceQuery, RawCandidate, Review};

// =============================================================================
// PLACE REPOSITORY
// =============================================================================

/// Persistence and dedup layer over the place collection.
#[async_trait]
pub trait PlaceRepository: Send + Sync {
    /// All places matching the query's filters, in insertion order.
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<Place>>;

    /// Insert, or merge into the record holding the same `external_id`.
    ///
    /// Merge semantics: reviews append-dedup by `(source, url)`, vibe tags
    /// ordered union, `original` untouched. Idempotent, and safe under
    /// concurrent upserts of the same `external_id`.
    async fn upsert(&self, place: Place) -> Result<Place>;

    /// Fetch by id. `Error::PlaceNotFound` when absent.
    async fn get(&self, id: Uuid) -> Result<Place>;

    /// First place whose name case-insensitively contains `name`.
    async fn find_by_name(&self, name: &str) -> Result<Option<Place>>;

    /// Which of the given external ids already exist in the store.
    async fn known_external_ids(&self, ids: &[String]) -> Result<HashSet<String>>;
}

// =============================================================================
// CANDIDATE SUPPLIER
// =============================================================================

/// Adapter over the external places directory.
#[async_trait]
pub trait CandidateSupplier: Send + Sync {
    /// Short supplier label used in the response `source` field
    /// (e.g. "tomtom" → "database_and_tomtom").
    fn name(&self) -> &str;

    /// Fetch up to `limit` raw candidates for (city, category).
    ///
    /// May return fewer than `limit` (directory exhausted). Failure is
    /// `Error::Supplier`; the orchestrator treats it as zero new
    /// candidates, never as a fatal pipeline error.
    async fn fetch_candidates(
        &self,
        city: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<RawCandidate>>;
}

// =============================================================================
// REVIEW SOURCE
// =============================================================================

/// Adapter over the community-review search endpoint.
///
/// Callers go through `ReviewHarvester`, which owns the rate limit and the
/// synthetic fallback; implementations only perform one raw search.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Source label recorded on harvested snippets (e.g. "reddit").
    fn name(&self) -> &str;

    /// Search for review snippets about `place_name` in `city`.
    async fn search_reviews(
        &self,
        place_name: &str,
        city: &str,
        limit: usize,
    ) -> Result<Vec<Review>>;
}

// =============================================================================
// GENERATION BACKEND
// =============================================================================

/// Trait for text generation backends.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with the backend instructed to emit strict JSON.
    async fn generate_json(&self, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
