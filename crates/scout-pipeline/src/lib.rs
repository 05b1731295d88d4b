//! # scout-pipeline
//!
//! Fallback search and enrichment orchestration for vibescout.
//!
//! This crate provides:
//! - Query normalization for structured filters and free-form utterances
//! - The fallback orchestrator: local search, candidate fetch, per-candidate
//!   enrichment (harvest, summarize, persist), final authoritative re-search
//!
//! ## Example
//!
//! ```ignore
//! use scout_pipeline::{normalize_filter, FallbackOrchestrator, FilterRequest};
//!
//! let query = normalize_filter(request)?;
//! let outcome = orchestrator.search(&query).await;
//! assert!(outcome.success);
//! ```

pub mod normalize;
pub mod orchestrator;

// Re-export core types
pub use scout_core::*;

pub use normalize::{
    normalize_filter, FilterRequest, NormalizedQuery, QueryNormalizer, TagsInput, MISSING_PARAMS,
};
pub use orchestrator::{FallbackOrchestrator, PipelineStage, SearchOutcome};
