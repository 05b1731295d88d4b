//! PostgreSQL-backed place repository.
//!
//! Places are stored as one row per venue with the document fields
//! (`original`, `processed`, `reviews`) in JSONB. The `external_id` column
//! carries the supplier's identifier and is the dedup key: writes go through
//! an insert-or-merge upsert so concurrent enrichment of the same venue never
//! drops reviews or replaces the `original` snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashSet;
use uuid::Uuid;

use scout_core::models::{sanitize_reviews, Place, PlaceOrigin, PlaceQuery, Review, VibeSummary};
use scout_core::{Error, PlaceRepository, Result};

use crate::escape_like;

/// Column list shared by every SELECT that maps into a [`Place`].
const PLACE_COLUMNS: &str = "id, external_id, original, processed, reviews, created_at, updated_at";

/// PostgreSQL implementation of [`PlaceRepository`].
#[derive(Clone)]
pub struct PgPlaceRepository {
    pool: Pool<Postgres>,
}

impl PgPlaceRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Map a database row to a [`Place`].
fn map_row_to_place(row: sqlx::postgres::PgRow) -> Result<Place> {
    let original: JsonValue = row.get("original");
    let processed: JsonValue = row.get("processed");
    let reviews: JsonValue = row.get("reviews");

    let original: PlaceOrigin = serde_json::from_value(original)?;
    let processed: VibeSummary = serde_json::from_value(processed)?;
    let reviews: Vec<Review> = serde_json::from_value(reviews)?;

    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(Place {
        id: row.get("id"),
        external_id: row.get("external_id"),
        original,
        processed,
        reviews,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl PlaceRepository for PgPlaceRepository {
    async fn search(&self, query: &PlaceQuery) -> Result<Vec<Place>> {
        // City prefilter happens in SQL; category and tag matching share the
        // in-process predicate with the memory store so both backends agree.
        let rows = if query.city.is_empty() {
            sqlx::query(&format!(
                "SELECT {PLACE_COLUMNS} FROM place ORDER BY seq"
            ))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?
        } else {
            sqlx::query(&format!(
                "SELECT {PLACE_COLUMNS} FROM place WHERE LOWER(original->>'city') = $1 ORDER BY seq"
            ))
            .bind(&query.city)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?
        };

        let mut places = Vec::new();
        for row in rows {
            let place = map_row_to_place(row)?;
            if query.matches(&place) {
                places.push(place);
            }
        }
        Ok(places)
    }

    async fn upsert(&self, place: Place) -> Result<Place> {
        let mut place = place;
        place.reviews = sanitize_reviews(std::mem::take(&mut place.reviews));

        let original = serde_json::to_value(&place.original)?;
        let processed = serde_json::to_value(&place.processed)?;
        let reviews = serde_json::to_value(&place.reviews)?;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO place (id, external_id, original, processed, reviews, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(place.id)
        .bind(&place.external_id)
        .bind(&original)
        .bind(&processed)
        .bind(&reviews)
        .bind(place.created_at)
        .bind(place.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        if inserted == 1 {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(place);
        }

        // Row exists: lock it, merge in process, write back. The row lock
        // serializes concurrent upserts of the same external id.
        let row = sqlx::query(&format!(
            "SELECT {PLACE_COLUMNS} FROM place WHERE external_id = $1 FOR UPDATE"
        ))
        .bind(&place.external_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let mut stored = map_row_to_place(row)?;
        stored.merge_from(place);

        let processed = serde_json::to_value(&stored.processed)?;
        let reviews = serde_json::to_value(&stored.reviews)?;

        sqlx::query(
            "UPDATE place SET processed = $1, reviews = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(&processed)
        .bind(&reviews)
        .bind(stored.updated_at)
        .bind(stored.id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Place> {
        let row = sqlx::query(&format!(
            "SELECT {PLACE_COLUMNS} FROM place WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => map_row_to_place(row),
            None => Err(Error::PlaceNotFound(id)),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Place>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let pattern = format!("%{}%", escape_like(&needle));
        let row = sqlx::query(&format!(
            r"SELECT {PLACE_COLUMNS} FROM place
              WHERE LOWER(original->>'name') LIKE $1 ESCAPE '\'
              ORDER BY seq LIMIT 1"
        ))
        .bind(&pattern)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Ok(Some(map_row_to_place(row)?)),
            None => Ok(None),
        }
    }

    async fn known_external_ids(&self, ids: &[String]) -> Result<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query("SELECT external_id FROM place WHERE external_id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("external_id"))
            .collect())
    }
}
