//! TomTom place directory supplier.
//!
//! Implements [`CandidateSupplier`] against the TomTom Search API: the query
//! city is geocoded first, then a POI search around that position produces
//! raw candidates. Geocoding failures degrade to a fixed fallback position
//! instead of failing the fetch; only the POI search itself is fatal to the
//! supplier call.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use scout_core::defaults;
use scout_core::models::{Coordinates, RawCandidate};
use scout_core::{CandidateSupplier, Error, Result};

/// Default TomTom Search API endpoint.
pub const DEFAULT_TOMTOM_BASE: &str = "https://api.tomtom.com/search/2";

/// TomTom-backed [`CandidateSupplier`].
#[derive(Debug)]
pub struct TomTomDirectory {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TomTomDirectory {
    /// Create a supplier against the public TomTom endpoint.
    pub fn new(api_key: String) -> Self {
        Self::with_config(DEFAULT_TOMTOM_BASE.to_string(), api_key)
    }

    /// Create a supplier with a custom base URL (used by tests).
    pub fn with_config(base_url: String, api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::SUPPLIER_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Create from environment variables.
    ///
    /// `TOMTOM_API_KEY` is required; `TOMTOM_BASE` optionally overrides the
    /// endpoint. A missing key is a configuration error so callers can run
    /// without the supplier instead of failing every fetch.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TOMTOM_API_KEY")
            .map_err(|_| Error::Config("TOMTOM_API_KEY not set".to_string()))?;
        if api_key.is_empty() {
            return Err(Error::Config("TOMTOM_API_KEY is empty".to_string()));
        }
        let base_url =
            std::env::var("TOMTOM_BASE").unwrap_or_else(|_| DEFAULT_TOMTOM_BASE.to_string());
        Ok(Self::with_config(base_url, api_key))
    }

    /// Resolve a city name to coordinates.
    ///
    /// Any failure falls back to the default position rather than erroring;
    /// a POI search around the fallback still returns usable candidates.
    async fn geocode(&self, city: &str) -> Coordinates {
        let fallback = Coordinates {
            lat: defaults::GEOCODE_FALLBACK_LAT,
            lon: defaults::GEOCODE_FALLBACK_LON,
        };

        let url = format!(
            "{}/geocode/{}.json",
            self.base_url,
            urlencoding::encode(city)
        );
        let response = match self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("limit", "1")])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    subsystem = "sources",
                    component = "tomtom",
                    op = "geocode",
                    city = %city,
                    error = %e,
                    "Geocoding request failed, using fallback position"
                );
                return fallback;
            }
        };

        if !response.status().is_success() {
            warn!(
                subsystem = "sources",
                component = "tomtom",
                op = "geocode",
                city = %city,
                status = %response.status(),
                "Geocoding returned non-success status, using fallback position"
            );
            return fallback;
        }

        match response.json::<GeocodeResponse>().await {
            Ok(body) => body
                .results
                .into_iter()
                .filter_map(|r| r.position)
                .map(|p| Coordinates { lat: p.lat, lon: p.lon })
                .next()
                .unwrap_or(fallback),
            Err(e) => {
                warn!(
                    subsystem = "sources",
                    component = "tomtom",
                    op = "geocode",
                    city = %city,
                    error = %e,
                    "Failed to parse geocoding response, using fallback position"
                );
                fallback
            }
        }
    }
}

/// Expand a normalized category into the terms TomTom's POI index matches
/// best. Unknown categories pass through unchanged.
fn search_terms(category: &str) -> &str {
    match category {
        "cafe" | "coffee" => "cafe coffee",
        "restaurant" => "restaurant food",
        "bar" => "bar pub",
        "shopping" => "shopping mall",
        "gym" => "gym fitness",
        "theater" => "theater cinema",
        other => other,
    }
}

/// Map POI results to candidates, skipping entries unusable downstream
/// (no id to dedup on, no name to harvest with, no position).
fn map_results(results: Vec<PoiResult>) -> Vec<RawCandidate> {
    let mut candidates = Vec::new();
    for result in results {
        let position = match result.position {
            Some(position) => position,
            None => continue,
        };
        if result.id.is_empty() || result.poi.name.is_empty() {
            continue;
        }

        let category = result
            .poi
            .category_set
            .into_iter()
            .map(|c| c.name)
            .find(|name| !name.is_empty())
            .unwrap_or_else(|| "General".to_string());

        candidates.push(RawCandidate {
            external_id: result.id,
            name: result.poi.name,
            category,
            address: result.address.freeform_address,
            locality: result.address.municipality,
            country: result.address.country,
            photo_url: None,
            coordinates: Coordinates {
                lat: position.lat,
                lon: position.lon,
            },
        });
    }
    candidates
}

#[async_trait]
impl CandidateSupplier for TomTomDirectory {
    fn name(&self) -> &str {
        "tomtom"
    }

    #[instrument(skip(self), fields(subsystem = "sources", component = "tomtom", op = "fetch_candidates", city = %city, category = %category))]
    async fn fetch_candidates(
        &self,
        city: &str,
        category: &str,
        limit: usize,
    ) -> Result<Vec<RawCandidate>> {
        let position = self.geocode(city).await;
        let terms = search_terms(category);
        let limit = limit.min(defaults::SUPPLIER_FETCH_LIMIT);

        let url = format!(
            "{}/poiSearch/{}.json",
            self.base_url,
            urlencoding::encode(terms)
        );
        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("lat", &position.lat.to_string()),
                ("lon", &position.lon.to_string()),
                ("radius", &defaults::SUPPLIER_RADIUS_METERS.to_string()),
                ("limit", &limit.to_string()),
                ("idxSet", "POI"),
            ])
            .send()
            .await
            .map_err(|e| Error::Supplier(format!("TomTom request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Supplier(format!(
                "TomTom returned {}: {}",
                status, body
            )));
        }

        let body: PoiSearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Supplier(format!("Failed to parse TomTom response: {}", e)))?;

        let candidates = map_results(body.results);
        debug!(
            candidate_count = candidates.len(),
            "Fetched candidates from TomTom"
        );
        Ok(candidates)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    position: Option<Position>,
}

#[derive(Deserialize)]
struct PoiSearchResponse {
    #[serde(default)]
    results: Vec<PoiResult>,
}

#[derive(Deserialize)]
struct PoiResult {
    #[serde(default)]
    id: String,
    #[serde(default)]
    poi: Poi,
    #[serde(default)]
    address: Address,
    position: Option<Position>,
}

#[derive(Deserialize, Default)]
struct Poi {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "categorySet")]
    category_set: Vec<CategoryEntry>,
}

#[derive(Deserialize)]
struct CategoryEntry {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize, Default)]
struct Address {
    #[serde(default, rename = "freeformAddress")]
    freeform_address: String,
    #[serde(default)]
    municipality: String,
    #[serde(default)]
    country: String,
}

#[derive(Deserialize, Clone, Copy)]
struct Position {
    lat: f64,
    lon: f64,
}
