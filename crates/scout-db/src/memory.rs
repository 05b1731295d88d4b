//! In-memory place store.
//!
//! Backs unit tests and API-level tests that should not depend on a running
//! PostgreSQL server. Implements the same upsert-merge and search semantics
//! as [`crate::PgPlaceRepository`] via the shared predicates in `scout-core`,
//! so pipeline behavior observed against this store holds against Postgres.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use uuid::Uuid;

use scout_core::models::{sanitize_reviews, Place, PlaceQuery};
use scout_core::{Error, PlaceRepository, Result};

/// Vec-backed [`PlaceRepository`] guarded by an async lock.
///
/// Insertion order is preserved, matching the `ORDER BY seq` contract of the
/// Postgres implementation.
#[derive(Default)]
pub struct MemoryPlaceStore {
    places: RwLock<Vec<Place>>,
}

impl MemoryPlaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing places, preserving order.
    pub async fn with_places(places: Vec<Place>) -> Self {
        let store = Self::new();
        for place in places {
            // Seeding goes through upsert so write rules apply uniformly.
            let _ = store.upsert(place).await;
        }
        store
    }

    /// Number of stored places.
    pub async fn len(&self) -> usize {
        self.places.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.places.read().await.is_empty()
    }
}

#[async_trait]
impl PlaceRepository for MemoryPlaceStore {
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<Place>> {
        let places = self.places.read().await;
        Ok(places
            .iter()
            .filter(|place| query.matches(place))
            .cloned()
            .collect())
    }

    async fn upsert(&self, place: Place) -> Result<Place> {
        let mut place = place;
        place.reviews = sanitize_reviews(std::mem::take(&mut place.reviews));

        let mut places = self.places.write().await;
        match places
            .iter_mut()
            .find(|p| p.external_id == place.external_id)
        {
            Some(existing) => {
                existing.merge_from(place);
                Ok(existing.clone())
            }
            None => {
                places.push(place.clone());
                Ok(place)
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Place> {
        let places = self.places.read().await;
        places
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(Error::PlaceNotFound(id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Place>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let places = self.places.read().await;
        Ok(places
            .iter()
            .find(|p| p.original.name.to_lowercase().contains(&needle))
            .cloned())
    }

    async fn known_external_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        let places = self.places.read().await;
        let stored: HashSet<&str> = places.iter().map(|p| p.external_id.as_str()).collect();
        Ok(ids
            .iter()
            .filter(|id| stored.contains(id.as_str()))
            .cloned()
            .collect())
    }
}
