//! Mock suppliers and review sources for deterministic testing.
//!
//! Provides scripted implementations of [`CandidateSupplier`] and
//! [`ReviewSource`] with call logs and failure injection, so pipeline and
//! API tests can run without network access.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scout_sources::mock::MockDirectory;
//!
//! #[tokio::test]
//! async fn test_with_mock_directory() {
//!     let directory = MockDirectory::new().with_candidate(candidate("t-1", "Blue Tokai"));
//!
//!     let found = directory.fetch_candidates("delhi", "cafe", 10).await.unwrap();
//!     assert_eq!(found.len(), 1);
//!     assert_eq!(directory.fetch_call_count(), 1);
//! }
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use scout_core::models::{RawCandidate, Review};
use scout_core::{CandidateSupplier, Error, Result, ReviewSource};

/// One logged supplier fetch.
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub city: String,
    pub category: String,
    pub limit: usize,
}

/// Scripted [`CandidateSupplier`] for tests.
#[derive(Clone)]
pub struct MockDirectory {
    config: Arc<DirectoryConfig>,
    call_log: Arc<Mutex<Vec<FetchCall>>>,
}

#[derive(Debug, Clone, Default)]
struct DirectoryConfig {
    candidates: Vec<RawCandidate>,
    fail: bool,
    latency_ms: u64,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            config: Arc::new(DirectoryConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the scripted candidate list.
    pub fn with_candidates(mut self, candidates: Vec<RawCandidate>) -> Self {
        Arc::make_mut(&mut self.config).candidates = candidates;
        self
    }

    /// Append one scripted candidate.
    pub fn with_candidate(mut self, candidate: RawCandidate) -> Self {
        Arc::make_mut(&mut self.config).candidates.push(candidate);
        self
    }

    /// Make every fetch fail (for degradation tests).
    pub fn with_failure(mut self, fail: bool) -> Self {
        Arc::make_mut(&mut self.config).fail = fail;
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Get all logged fetches for assertion.
    pub fn get_calls(&self) -> Vec<FetchCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of fetches issued.
    pub fn fetch_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

impl Default for MockDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CandidateSupplier for MockDirectory {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_candidates(
        &self,
        city: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<RawCandidate>> {
        self.call_log.lock().unwrap().push(FetchCall {
            city: city.to_string(),
            category: category.to_string(),
            limit,
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail {
            return Err(Error::Supplier("simulated supplier failure".to_string()));
        }

        let mut candidates = self.config.candidates.clone();
        candidates.truncate(limit);
        Ok(candidates)
    }
}

/// One logged review search.
#[derive(Debug, Clone)]
pub struct SearchCall {
    pub place_name: String,
    pub city: String,
    pub limit: usize,
}

/// Scripted [`ReviewSource`] for tests.
#[derive(Clone)]
pub struct MockReviewSource {
    config: Arc<ReviewConfig>,
    call_log: Arc<Mutex<Vec<SearchCall>>>,
}

#[derive(Debug, Clone, Default)]
struct ReviewConfig {
    default_snippets: Vec<Review>,
    per_place: HashMap<String, Vec<Review>>,
    fail: bool,
    fail_for: HashSet<String>,
    latency_ms: u64,
}

impl MockReviewSource {
    pub fn new() -> Self {
        Self {
            config: Arc::new(ReviewConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snippets returned for any place without a specific mapping.
    pub fn with_default_snippets(mut self, snippets: Vec<Review>) -> Self {
        Arc::make_mut(&mut self.config).default_snippets = snippets;
        self
    }

    /// Snippets returned for one specific place name.
    pub fn with_snippets(mut self, place_name: impl Into<String>, snippets: Vec<Review>) -> Self {
        Arc::make_mut(&mut self.config)
            .per_place
            .insert(place_name.into(), snippets);
        self
    }

    /// Make every search fail (for degradation tests).
    pub fn with_failure(mut self, fail: bool) -> Self {
        Arc::make_mut(&mut self.config).fail = fail;
        self
    }

    /// Make searches for one specific place fail.
    pub fn with_failure_for(mut self, place_name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .fail_for
            .insert(place_name.into());
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Get all logged searches for assertion.
    pub fn get_calls(&self) -> Vec<SearchCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of searches issued.
    pub fn search_call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

impl Default for MockReviewSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewSource for MockReviewSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_reviews(
        &self,
        place_name: &str,
        city: &str,
        limit: usize,
    ) -> Result<Vec<Review>> {
        self.call_log.lock().unwrap().push(SearchCall {
            place_name: place_name.to_string(),
            city: city.to_string(),
            limit,
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail || self.config.fail_for.contains(place_name) {
            return Err(Error::Harvest("simulated harvest failure".to_string()));
        }

        let mut snippets = self
            .config
            .per_place
            .get(place_name)
            .cloned()
            .unwrap_or_else(|| self.config.default_snippets.clone());
        snippets.truncate(limit);
        Ok(snippets)
    }
}
