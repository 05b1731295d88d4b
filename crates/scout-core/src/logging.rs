//! Structured logging schema and field name constants for vibescout.
//!
//! All crates use these constants for consistent structured logging fields.
//! This ensures log aggregation tools (Loki, Elasticsearch) can query by
//! standardized field names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, stage transitions, config choices |
//! | TRACE | Per-item iteration, high-volume data (snippets, candidates) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → pipeline run → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "pipeline", "db", "sources", "inference"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "harvester", "tomtom", "reddit", "ollama", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "fetch_candidates", "harvest", "summarize", "upsert"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Place UUID being operated on.
pub const PLACE_ID: &str = "place_id";

/// Supplier-assigned external id (the dedup key).
pub const EXTERNAL_ID: &str = "external_id";

/// Place display name.
pub const PLACE_NAME: &str = "place_name";

/// Query city.
pub const CITY: &str = "city";

/// Query category.
pub const CATEGORY: &str = "category";

/// Pipeline stage name ("local_search", "enriching", ...).
pub const STAGE: &str = "stage";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidates fetched from the directory.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of review snippets harvested for one place.
pub const SNIPPET_COUNT: &str = "snippet_count";

/// Byte length of a prompt or response.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Why a degrading fallback was applied ("supplier_failed", "empty_harvest",
/// "summarize_failed", "upsert_failed", "unit_timeout").
pub const DEGRADE_REASON: &str = "degrade_reason";

/// Whether the fallback path ran for this request.
pub const FALLBACK_USED: &str = "fallback_used";
