//! Reddit review source.
//!
//! Queries the public `search.json` endpoint for posts mentioning a place
//! and turns substantial posts into review snippets. No authentication: the
//! endpoint is rate-tolerant of a browser user agent at the pacing enforced
//! by [`crate::HarvestThrottle`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use scout_core::defaults;
use scout_core::models::{truncate_chars, Review};
use scout_core::{Error, Result, ReviewSource};

/// Default Reddit endpoint.
pub const DEFAULT_REDDIT_BASE: &str = "https://www.reddit.com";

/// Plain `search.json` requests with a generic client UA get 429'd almost
/// immediately; a browser user agent is tolerated.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Reddit-backed [`ReviewSource`].
pub struct RedditReviewSource {
    client: Client,
    base_url: String,
}

impl RedditReviewSource {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_REDDIT_BASE.to_string())
    }

    /// Create a source with a custom base URL (used by tests).
    pub fn with_base_url(base_url: String) -> Self {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(defaults::HARVEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    /// Create from environment variables.
    ///
    /// `REDDIT_BASE` optionally overrides the endpoint.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("REDDIT_BASE").unwrap_or_else(|_| DEFAULT_REDDIT_BASE.to_string());
        Self::with_base_url(base_url)
    }
}

impl Default for RedditReviewSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewSource for RedditReviewSource {
    fn name(&self) -> &str {
        "reddit"
    }

    #[instrument(skip(self), fields(subsystem = "sources", component = "reddit", op = "search_reviews", place_name = %place_name, city = %city))]
    async fn search_reviews(
        &self,
        place_name: &str,
        city: &str,
        limit: usize,
    ) -> Result<Vec<Review>> {
        // Quoted terms keep the search on-topic for multi-word place names.
        let query = format!("\"{}\" \"{}\" review", place_name, city);

        let response = self
            .client
            .get(format!("{}/search.json", self.base_url))
            .query(&[
                ("q", query.as_str()),
                ("sort", "relevance"),
                ("t", "all"),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Harvest(format!("Reddit request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Harvest(format!(
                "Reddit returned {}",
                response.status()
            )));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| Error::Harvest(format!("Failed to parse Reddit response: {}", e)))?;

        let reviews = extract_reviews(listing, limit);
        debug!(snippet_count = reviews.len(), "Harvested Reddit snippets");
        Ok(reviews)
    }
}

/// Turn a search listing into review snippets: substantial posts only,
/// highest-scored first, capped at `limit`.
fn extract_reviews(listing: Listing, limit: usize) -> Vec<Review> {
    let mut reviews = Vec::new();
    for child in listing.data.children {
        let post = child.data;

        let mut content = post.title;
        content.push_str("\n\n");
        content.push_str(&post.selftext);
        let content = content.trim();

        if content.chars().count() <= defaults::HARVEST_MIN_CONTENT_CHARS {
            continue;
        }

        reviews.push(Review {
            source: "reddit".to_string(),
            content: truncate_chars(content, defaults::REVIEW_MAX_CONTENT_CHARS),
            url: post.url,
            score: post.score,
            created_at: DateTime::from_timestamp(post.created_utc as i64, 0)
                .unwrap_or_else(Utc::now),
        });
    }

    // Stable sort keeps relevance order among equal scores.
    reviews.sort_by(|a, b| b.score.cmp(&a.score));
    reviews.truncate(limit);
    reviews
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    data: ListingData,
}

#[derive(Deserialize, Default)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    #[serde(default)]
    data: Post,
}

#[derive(Deserialize, Default)]
struct Post {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(posts: &[(&str, &str, &str, i64)]) -> Listing {
        Listing {
            data: ListingData {
                children: posts
                    .iter()
                    .map(|(title, selftext, url, score)| ListingChild {
                        data: Post {
                            title: title.to_string(),
                            selftext: selftext.to_string(),
                            url: url.to_string(),
                            score: *score,
                            created_utc: 1_640_995_200.0,
                        },
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn test_extract_combines_title_and_selftext() {
        let listing = listing(&[(
            "Blue Tokai appreciation post",
            "Best pour-over in the city, staff lets you sit for hours.",
            "https://reddit.com/r/delhi/comments/abc",
            12,
        )]);

        let reviews = extract_reviews(listing, 5);
        assert_eq!(reviews.len(), 1);
        assert!(reviews[0]
            .content
            .starts_with("Blue Tokai appreciation post\n\n"));
        assert_eq!(reviews[0].source, "reddit");
        assert_eq!(reviews[0].score, 12);
        assert_eq!(reviews[0].created_at.timestamp(), 1_640_995_200);
    }

    #[test]
    fn test_extract_drops_short_posts() {
        let listing = listing(&[
            ("Too short", "", "https://reddit.com/1", 99),
            (
                "Long enough to clear the substance bar for harvested snippets",
                "",
                "https://reddit.com/2",
                1,
            ),
        ]);

        let reviews = extract_reviews(listing, 5);
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].url, "https://reddit.com/2");
    }

    #[test]
    fn test_extract_sorts_by_score_and_caps() {
        let body = "A review long enough to pass the minimum content filter easily.";
        let listing = listing(&[
            ("Post one", body, "https://reddit.com/1", 5),
            ("Post two", body, "https://reddit.com/2", 50),
            ("Post three", body, "https://reddit.com/3", 20),
        ]);

        let reviews = extract_reviews(listing, 2);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].score, 50);
        assert_eq!(reviews[1].score, 20);
    }

    #[test]
    fn test_extract_truncates_long_content() {
        let long_body = "x".repeat(3000);
        let listing = listing(&[("Wall of text", &long_body, "https://reddit.com/1", 1)]);

        let reviews = extract_reviews(listing, 5);
        assert_eq!(
            reviews[0].content.chars().count(),
            defaults::REVIEW_MAX_CONTENT_CHARS
        );
    }

    #[test]
    fn test_listing_parses_reddit_shape() {
        let raw = r#"{
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"title": "T", "selftext": "S", "url": "https://u", "score": 3, "created_utc": 1700000000.0}}
                ],
                "after": null
            }
        }"#;
        let listing: Listing = serde_json::from_str(raw).unwrap();
        assert_eq!(listing.data.children.len(), 1);
        assert_eq!(listing.data.children[0].data.score, 3);
    }
}
