//! # scout-sources
//!
//! External data acquisition for vibescout.
//!
//! This crate provides:
//! - TomTom place directory supplier (geocode + POI search)
//! - Reddit review source over the public search endpoint
//! - Paced review harvesting with synthetic fallback
//! - Scripted mocks for offline tests

pub mod harvest;
pub mod reddit;
pub mod throttle;
pub mod tomtom;

// Mock sources for testing
// Note: Always compiled so dependent crates' tests can drive the pipeline
// without network access
pub mod mock;

// Re-export core types
pub use scout_core::*;

pub use harvest::{synthetic_reviews, ReviewHarvester};
pub use mock::{MockDirectory, MockReviewSource};
pub use reddit::{RedditReviewSource, DEFAULT_REDDIT_BASE};
pub use throttle::HarvestThrottle;
pub use tomtom::{TomTomDirectory, DEFAULT_TOMTOM_BASE};
