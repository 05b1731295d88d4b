//! Review harvesting with pacing and synthetic fallback.
//!
//! [`ReviewHarvester`] is the single entry point enrichment units use to get
//! review snippets for a place. It owns the pacing policy (shared
//! [`HarvestThrottle`]) and the degradation policy: a source failure or an
//! empty harvest yields synthetic placeholder snippets instead of an error,
//! so one place's harvest never fails its enrichment unit.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use scout_core::defaults;
use scout_core::models::Review;
use scout_core::ReviewSource;

use crate::throttle::HarvestThrottle;

/// Epoch for synthetic review timestamps (fixed so re-harvests are stable).
const SYNTHETIC_CREATED_UTC: i64 = 1_640_995_200;

/// Paced review harvester with synthetic fallback.
pub struct ReviewHarvester {
    source: Arc<dyn ReviewSource>,
    throttle: Arc<HarvestThrottle>,
    target_snippets: usize,
}

impl ReviewHarvester {
    pub fn new(source: Arc<dyn ReviewSource>, throttle: Arc<HarvestThrottle>) -> Self {
        Self {
            source,
            throttle,
            target_snippets: defaults::HARVEST_TARGET_SNIPPETS,
        }
    }

    /// Override the number of snippets requested per place.
    pub fn with_target_snippets(mut self, target: usize) -> Self {
        self.target_snippets = target.max(1);
        self
    }

    /// Harvest review snippets for one place.
    ///
    /// Waits for the shared throttle before touching the source. Returns
    /// synthetic placeholders when the source errors or yields nothing, so
    /// the result is never empty.
    #[instrument(skip(self), fields(subsystem = "sources", component = "harvester", op = "harvest", place_name = %place_name, city = %city))]
    pub async fn harvest(&self, place_name: &str, city: &str) -> Vec<Review> {
        self.throttle.acquire().await;

        match self
            .source
            .search_reviews(place_name, city, self.target_snippets)
            .await
        {
            Ok(reviews) if !reviews.is_empty() => reviews,
            Ok(_) => {
                info!(
                    source = self.source.name(),
                    degrade_reason = "empty_harvest",
                    "No usable snippets, using synthetic reviews"
                );
                synthetic_reviews(place_name, city, self.target_snippets)
            }
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    degrade_reason = "harvest_failed",
                    error = %e,
                    "Harvest failed, using synthetic reviews"
                );
                synthetic_reviews(place_name, city, self.target_snippets)
            }
        }
    }
}

/// Placeholder snippets for places nothing was harvested for.
///
/// Marked with the synthetic source and stable per-place URLs, so repeated
/// enrichment of the same place dedups against earlier placeholders instead
/// of stacking copies.
pub fn synthetic_reviews(place_name: &str, city: &str, max: usize) -> Vec<Review> {
    let created_at = DateTime::from_timestamp(SYNTHETIC_CREATED_UTC, 0).unwrap_or_else(Utc::now);
    let slug = slugify(place_name);

    let templates = [
        (
            format!(
                "Just visited {} in {} and it was amazing! The atmosphere is perfect for studying and the coffee is top-notch. Highly recommend for anyone looking for a cozy spot.",
                place_name, city
            ),
            45,
        ),
        (
            format!(
                "Been to {} multiple times now. The staff is super friendly and the food quality is consistently good. Great place to hang out with friends in {}.",
                place_name, city
            ),
            32,
        ),
        (
            format!(
                "Honest review of {}: The location is convenient and the prices are reasonable for {}. However, it can get quite crowded during peak hours.",
                place_name, city
            ),
            28,
        ),
    ];

    templates
        .into_iter()
        .enumerate()
        .take(max)
        .map(|(i, (content, score))| Review {
            source: defaults::SYNTHETIC_SOURCE.to_string(),
            content,
            url: format!("synthetic://reviews/{}/{}", slug, i + 1),
            score,
            created_at,
        })
        .collect()
}

/// Lowercase alphanumeric slug for synthetic review URLs.
fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        "place".to_string()
    } else {
        out
    }
}
