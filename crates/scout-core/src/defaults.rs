//! Centralized default constants for the vibescout system.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// SEARCH
// =============================================================================

/// Minimum match count below which the fallback pipeline triggers.
pub const MIN_RESULTS: usize = 5;

// =============================================================================
// CANDIDATE SUPPLIER
// =============================================================================

/// Search radius around the geocoded city center, in meters.
pub const SUPPLIER_RADIUS_METERS: u32 = 5_000;

/// Hard cap on candidates requested from the directory in one call.
pub const SUPPLIER_FETCH_LIMIT: usize = 50;

/// Per-call timeout for directory requests.
pub const SUPPLIER_TIMEOUT_SECS: u64 = 10;

/// Fallback city center when geocoding fails (Delhi).
pub const GEOCODE_FALLBACK_LAT: f64 = 28.6139;

/// Fallback city center when geocoding fails (Delhi).
pub const GEOCODE_FALLBACK_LON: f64 = 77.2090;

// =============================================================================
// REVIEW HARVEST
// =============================================================================

/// Target number of review snippets per place.
pub const HARVEST_TARGET_SNIPPETS: usize = 5;

/// Snippets shorter than this are discarded as non-substantial.
pub const HARVEST_MIN_CONTENT_CHARS: usize = 50;

/// Review content is truncated to this length on write.
pub const REVIEW_MAX_CONTENT_CHARS: usize = 1000;

/// Harvester calls per second against the upstream review source.
pub const HARVEST_RATE_PER_SEC: u32 = 1;

/// Per-call timeout for review source requests.
pub const HARVEST_TIMEOUT_SECS: u64 = 10;

/// Source label attached to deterministic placeholder snippets.
pub const SYNTHETIC_SOURCE: &str = "synthetic";

// =============================================================================
// SUMMARIZATION
// =============================================================================

/// Upper bound on vibe tags kept from one summarization pass.
pub const VIBE_TAGS_MAX: usize = 6;

/// Upper bound on emojis kept from one summarization pass.
pub const EMOJIS_MAX: usize = 3;

/// Upper bound on citations recorded from one summarization pass.
pub const CITATIONS_MAX: usize = 3;

/// Combined review text is capped at this length before prompting.
pub const SUMMARY_INPUT_MAX_CHARS: usize = 2000;

/// Default Ollama generation model.
pub const GENERATE_MODEL: &str = "qwen3:8b";

/// Default Ollama base URL.
pub const OLLAMA_BASE: &str = "http://localhost:11434";

/// Per-call timeout for generation requests. Local models can be slow.
pub const GENERATION_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// PIPELINE
// =============================================================================

/// Wall-clock bound on one candidate's enrichment unit. Units exceeding it
/// are abandoned (left to finish in the background), not aborted.
pub const ENRICH_UNIT_TIMEOUT_SECS: u64 = 45;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_sane() {
        assert!(MIN_RESULTS >= 1);
        assert!(HARVEST_TARGET_SNIPPETS >= 3);
        assert!(HARVEST_MIN_CONTENT_CHARS < REVIEW_MAX_CONTENT_CHARS);
        assert!(VIBE_TAGS_MAX >= 3);
        assert!(SUPPLIER_FETCH_LIMIT >= MIN_RESULTS);
    }
}
