//! scout-api - HTTP API server for vibescout

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use scout_core::models::{Place, PlaceOrigin, Review, VibeSummary};
use scout_core::{defaults, CandidateSupplier, GenerationBackend, PlaceRepository, ReviewSource};
use scout_db::Database;
use scout_inference::{OllamaBackend, VibeSummarizer};
use scout_pipeline::{
    normalize_filter, FallbackOrchestrator, FilterRequest, NormalizedQuery, QueryNormalizer,
};
use scout_sources::{HarvestThrottle, RedditReviewSource, ReviewHarvester, TomTomDirectory};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so request ids sort chronologically in
/// logs and line up with the pipeline's place ids.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn PlaceRepository>,
    orchestrator: Arc<FallbackOrchestrator>,
    normalizer: Arc<QueryNormalizer>,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

enum ApiError {
    Internal(scout_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<scout_core::Error> for ApiError {
    fn from(err: scout_core::Error) -> Self {
        match &err {
            scout_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            scout_core::Error::PlaceNotFound(id) => {
                ApiError::NotFound(format!("Place {} not found", id))
            }
            scout_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            scout_core::Error::AmbiguousIntent(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// CORS CONFIGURATION HELPER
// =============================================================================

/// Parse allowed origins from the `CORS_ALLOWED_ORIGINS` environment variable
/// (comma-separated). Unset or empty falls back to the local frontend dev
/// servers.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

    if origins_str.trim().is_empty() {
        return vec![
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "scout_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scout_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("scout-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/vibescout".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| defaults::SERVER_PORT.to_string())
        .parse()
        .unwrap_or(defaults::SERVER_PORT);

    // Rate limiting configuration
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60 = 1 minute)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .unwrap_or_else(|_| defaults::RATE_LIMIT_REQUESTS.to_string())
        .parse()
        .unwrap_or(defaults::RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .unwrap_or_else(|_| defaults::RATE_LIMIT_PERIOD_SECS.to_string())
        .parse()
        .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let store: Arc<dyn PlaceRepository> = Arc::new(db.places.clone());

    // Candidate supplier is optional; without an API key the pipeline
    // serves local-only results instead of refusing to start.
    let supplier: Option<Arc<dyn CandidateSupplier>> = match TomTomDirectory::from_env() {
        Ok(directory) => {
            info!("Candidate supplier initialized: {}", directory.name());
            Some(Arc::new(directory))
        }
        Err(e) => {
            warn!(error = %e, "Candidate supplier disabled");
            None
        }
    };

    // Review harvesting, throttled across all enrichment units
    let harvest_rate: u32 = std::env::var("HARVEST_RATE_PER_SEC")
        .unwrap_or_else(|_| defaults::HARVEST_RATE_PER_SEC.to_string())
        .parse()
        .unwrap_or(defaults::HARVEST_RATE_PER_SEC);
    let review_source: Arc<dyn ReviewSource> = Arc::new(RedditReviewSource::from_env());
    let harvester = Arc::new(ReviewHarvester::new(
        review_source,
        Arc::new(HarvestThrottle::new(harvest_rate)),
    ));

    // One generation backend serves both summarization and intent classification
    let backend: Arc<dyn GenerationBackend> = Arc::new(OllamaBackend::from_env());
    info!("Inference backend initialized: {}", backend.model_name());
    let summarizer = Arc::new(VibeSummarizer::new(backend.clone()));
    let normalizer = Arc::new(QueryNormalizer::new(backend));

    let orchestrator = Arc::new(FallbackOrchestrator::new(
        store.clone(),
        supplier,
        harvester,
        summarizer,
    ));

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    // Create app state
    let state = AppState {
        store,
        orchestrator,
        normalizer,
        rate_limiter,
    };

    // Build router
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble the router with all routes and middleware. Split out of `main`
/// so tests can serve the same stack on an ephemeral port.
fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Fallback search pipeline
        .route("/api/v1/places/search", post(search_places))
        // Conversational entry point
        .route("/api/v1/chat", post(chat))
        // Direct ingestion and lookup
        .route("/api/v1/places", post(ingest_places))
        .route("/api/v1/places/:id", get(get_place))
        // Rate limiting status endpoint
        .route("/api/v1/rate-limit/status", get(rate_limit_status))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MiB
        .with_state(state)
}

// =============================================================================
// PLACE SEARCH
// =============================================================================

/// POST /api/v1/places/search
///
/// Structured filter in, pipeline outcome out. The outcome shape is stable
/// across degradations; only a fatal pipeline failure changes the status
/// code to 500.
async fn search_places(
    State(state): State<AppState>,
    Json(filter): Json<FilterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = normalize_filter(filter)?;
    let outcome = state.orchestrator.search(&query).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(outcome)))
}

// =============================================================================
// CHAT
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    utterance: Option<String>,
}

/// POST /api/v1/chat
///
/// Free-form utterance in, intent-shaped reply out. Search intents run the
/// same pipeline as the structured endpoint; detail intents resolve against
/// the store; small talk never touches it.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let utterance = request.utterance.unwrap_or_default();

    match state.normalizer.normalize_utterance(&utterance).await? {
        NormalizedQuery::Search(query) => {
            let outcome = state.orchestrator.search(&query).await;
            let city_label = if query.city.is_empty() {
                "your area".to_string()
            } else {
                query.city.clone()
            };
            let response = if outcome.count == 0 {
                format!(
                    "I couldn't find any places matching your criteria in {}. Try different search terms or location.",
                    city_label
                )
            } else {
                format!(
                    "I found {} places in {} that match your criteria.",
                    outcome.count, city_label
                )
            };
            let status = if outcome.success {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let mut body = serde_json::to_value(&outcome).map_err(scout_core::Error::from)?;
            if let Some(object) = body.as_object_mut() {
                object.insert("intent".to_string(), "place_search".into());
                object.insert("response".to_string(), response.into());
            }
            Ok((status, Json(body)))
        }
        NormalizedQuery::Detail { name } => {
            let body = match state.store.find_by_name(&name).await? {
                Some(place) => serde_json::json!({
                    "success": true,
                    "intent": "place_detail",
                    "response": describe_place(&place),
                    "place": place,
                    "found": true,
                }),
                None => serde_json::json!({
                    "success": true,
                    "intent": "place_detail",
                    "response": format!(
                        "I couldn't find any information about {}. Please check the spelling or try a different place.",
                        name
                    ),
                    "place": null,
                    "found": false,
                }),
            };
            Ok((StatusCode::OK, Json(body)))
        }
        NormalizedQuery::SmallTalk { reply } => Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "intent": "simple_response",
                "response": reply,
                "places": [],
            })),
        )),
    }
}

/// Natural-language summary of a stored place for the detail intent.
fn describe_place(place: &Place) -> String {
    let mut parts = vec![format!("Here's what I found about {}:", place.original.name)];
    if !place.original.category.is_empty() {
        parts.push(format!("It's a {}.", place.original.category));
    }
    if !place.processed.vibe_tags.is_empty() {
        parts.push(format!(
            "The vibe is: {}.",
            place.processed.vibe_tags.join(", ")
        ));
    }
    if !place.processed.emojis.is_empty() {
        parts.push(format!("Represented by: {}", place.processed.emojis.join(" ")));
    }
    if !place.reviews.is_empty() {
        parts.push(format!(
            "It has {} reviews from various sources.",
            place.reviews.len()
        ));
    }
    parts.join(" ")
}

// =============================================================================
// PLACE INGESTION AND LOOKUP
// =============================================================================

/// One document accepted by the bulk ingestion endpoint.
#[derive(Debug, Deserialize)]
struct PlaceDocument {
    external_id: String,
    original: PlaceOrigin,
    #[serde(default)]
    processed: VibeSummary,
    #[serde(default)]
    reviews: Vec<Review>,
}

/// POST /api/v1/places
///
/// Upserts every document in the body. A document whose `external_id` is
/// already stored merges into the existing record instead of failing.
async fn ingest_places(
    State(state): State<AppState>,
    Json(documents): Json<Vec<PlaceDocument>>,
) -> Result<impl IntoResponse, ApiError> {
    for (i, document) in documents.iter().enumerate() {
        if document.external_id.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Missing external_id for place at index {}",
                i
            )));
        }
        if document.original.name.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Missing name for place at index {}",
                i
            )));
        }
    }

    let mut count = 0;
    for document in documents {
        let now = Utc::now();
        state
            .store
            .upsert(Place {
                id: Uuid::now_v7(),
                external_id: document.external_id,
                original: document.original,
                processed: document.processed,
                reviews: document.reviews,
                created_at: now,
                updated_at: now,
            })
            .await?;
        count += 1;
    }
    info!(count, "Places ingested");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "count": count })),
    ))
}

/// GET /api/v1/places/:id
async fn get_place(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Place>, ApiError> {
    let place = state.store.get(id).await?;
    Ok(Json(place))
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    // If rate limiting is disabled, pass through
    if let Some(limiter) = &state.rate_limiter {
        // Check rate limit
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

/// Get rate limiting status.
async fn rate_limit_status(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(_limiter) = &state.rate_limiter {
        Json(serde_json::json!({
            "enabled": true,
            "message": "Rate limiting is active"
        }))
    } else {
        Json(serde_json::json!({
            "enabled": false,
            "message": "Rate limiting is disabled"
        }))
    }
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;

    use scout_core::models::{Coordinates, PlaceQuery, RawCandidate};
    use scout_core::Error;
    use scout_db::MemoryPlaceStore;
    use scout_inference::MockGenerationBackend;
    use scout_pipeline::MISSING_PARAMS;
    use scout_sources::{MockDirectory, MockReviewSource};

    const VIBE_JSON: &str = r#"{"summary": "Warm specialty coffee spot.", "vibe_tags": ["cozy", "aesthetic"], "emojis": ["☕"]}"#;

    fn test_candidate(id: &str, name: &str, category: &str) -> RawCandidate {
        RawCandidate {
            external_id: id.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            address: "114 Khan Market".to_string(),
            locality: "Khan Market".to_string(),
            country: "India".to_string(),
            photo_url: None,
            coordinates: Coordinates {
                lat: 28.6,
                lon: 77.22,
            },
        }
    }

    fn seeded_place(id: &str, name: &str, category: &str, city: &str, tags: &[&str]) -> Place {
        let mut place = Place::from_candidate(&test_candidate(id, name, category), city);
        place.processed.vibe_tags = tags.iter().map(|t| t.to_string()).collect();
        place
    }

    fn review_snippet(url: &str) -> Review {
        Review {
            source: "reddit".to_string(),
            content: "Went there twice last month and the filter coffee is worth the queue."
                .to_string(),
            url: url.to_string(),
            score: 12,
            created_at: Utc::now(),
        }
    }

    /// Store double whose every call fails, for the fatal-path status test.
    struct FailingStore;

    #[async_trait]
    impl PlaceRepository for FailingStore {
        async fn search(&self, _query: &PlaceQuery) -> scout_core::Result<Vec<Place>> {
            Err(Error::Internal("store offline".to_string()))
        }
        async fn upsert(&self, _place: Place) -> scout_core::Result<Place> {
            Err(Error::Internal("store offline".to_string()))
        }
        async fn get(&self, _id: Uuid) -> scout_core::Result<Place> {
            Err(Error::Internal("store offline".to_string()))
        }
        async fn find_by_name(&self, _name: &str) -> scout_core::Result<Option<Place>> {
            Err(Error::Internal("store offline".to_string()))
        }
        async fn known_external_ids(&self, _ids: &[String]) -> scout_core::Result<HashSet<String>> {
            Err(Error::Internal("store offline".to_string()))
        }
    }

    fn test_state(
        store: Arc<dyn PlaceRepository>,
        directory: Option<MockDirectory>,
        reviews: MockReviewSource,
        backend: MockGenerationBackend,
    ) -> AppState {
        let harvester = Arc::new(
            ReviewHarvester::new(
                Arc::new(reviews),
                Arc::new(HarvestThrottle::new(100)),
            )
            .with_target_snippets(2),
        );
        let backend: Arc<dyn GenerationBackend> = Arc::new(backend);
        AppState {
            store: store.clone(),
            orchestrator: Arc::new(FallbackOrchestrator::new(
                store,
                directory.map(|d| Arc::new(d) as Arc<dyn CandidateSupplier>),
                harvester,
                Arc::new(VibeSummarizer::new(backend.clone())),
            )),
            normalizer: Arc::new(QueryNormalizer::new(backend)),
            rate_limiter: None,
        }
    }

    /// Serve the router on an ephemeral port; returns the base URL.
    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    async fn post_json(
        base: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> (u16, serde_json::Value) {
        let response = reqwest::Client::new()
            .post(format!("{}{}", base, path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn get_json(base: &str, path: &str) -> (u16, serde_json::Value) {
        let response = reqwest::Client::new()
            .get(format!("{}{}", base, path))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let (status, body) = get_json(&base, "/health").await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_search_returns_local_matches_without_fallback() {
        let places = (0..5)
            .map(|i| {
                seeded_place(
                    &format!("seed-{}", i),
                    &format!("Cafe {}", i),
                    "Cafe",
                    "delhi",
                    &[],
                )
            })
            .collect();
        let store = Arc::new(MemoryPlaceStore::with_places(places).await);
        let directory = MockDirectory::new();
        let state = test_state(
            store,
            Some(directory.clone()),
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/places/search",
            &serde_json::json!({ "city": "Delhi", "category": "cafe" }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 5);
        assert_eq!(body["source"], "database");
        assert_eq!(body["fallback_used"], false);
        assert_eq!(directory.fetch_call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_fallback_enriches_and_serves_requery() {
        let seeded = vec![
            seeded_place("seed-1", "Blue Tokai", "Cafe", "delhi", &["aesthetic"]),
            seeded_place("seed-2", "Devans", "Cafe", "delhi", &["aesthetic"]),
        ];
        let store = Arc::new(MemoryPlaceStore::with_places(seeded).await);
        let directory = MockDirectory::new().with_candidates(vec![
            test_candidate("tt-1", "Kitab Khana", "Cafe"),
            test_candidate("tt-2", "Jugmug Thela", "Cafe"),
            test_candidate("tt-3", "Rose Cafe", "Cafe"),
        ]);
        let reviews = MockReviewSource::new().with_default_snippets(vec![
            review_snippet("https://reddit.com/r/delhi/1"),
            review_snippet("https://reddit.com/r/delhi/2"),
        ]);
        let backend = MockGenerationBackend::new().with_fixed_response(VIBE_JSON);
        let state = test_state(store.clone(), Some(directory.clone()), reviews, backend);
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/places/search",
            &serde_json::json!({
                "city": "Delhi",
                "category": "Cafe",
                "vibe_tags": ["aesthetic"],
                "min_results": 5
            }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 5);
        assert_eq!(body["source"], "database_and_mock");
        assert_eq!(body["fallback_used"], true);
        assert_eq!(body["candidates_fetched"], 3);
        assert_eq!(body["reviews_harvested"], 6);
        assert_eq!(body["places"].as_array().unwrap().len(), 5);

        // The supplier was asked only for the deficit
        let calls = directory.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].limit, 3);
        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn test_search_degrades_without_supplier() {
        let store = Arc::new(
            MemoryPlaceStore::with_places(vec![seeded_place(
                "seed-1",
                "Lone Cafe",
                "Cafe",
                "delhi",
                &[],
            )])
            .await,
        );
        let state = test_state(store, None, MockReviewSource::new(), MockGenerationBackend::new());
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/places/search",
            &serde_json::json!({ "city": "delhi", "category": "cafe" }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["source"], "database_only");
        assert_eq!(body["fallback_used"], true);
    }

    #[tokio::test]
    async fn test_search_rejects_missing_filters() {
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/places/search",
            &serde_json::json!({ "category": "cafe" }),
        )
        .await;

        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], MISSING_PARAMS);
    }

    #[tokio::test]
    async fn test_search_fatal_store_error_returns_500() {
        let state = test_state(
            Arc::new(FailingStore),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/places/search",
            &serde_json::json!({ "city": "delhi", "category": "cafe" }),
        )
        .await;

        assert_eq!(status, 500);
        assert_eq!(body["success"], false);
        assert_eq!(body["count"], 0);
        assert_eq!(body["error"], "Internal error: store offline");
    }

    #[tokio::test]
    async fn test_chat_search_intent_runs_pipeline() {
        let places = (0..5)
            .map(|i| {
                seeded_place(
                    &format!("seed-{}", i),
                    &format!("Cafe {}", i),
                    "Cafe",
                    "delhi",
                    &[],
                )
            })
            .collect();
        let store = Arc::new(MemoryPlaceStore::with_places(places).await);
        let backend = MockGenerationBackend::new().with_response_for(
            "intent classifier",
            r#"{"intent": "place_search", "confidence": 0.9, "extracted_data": {"city": "Delhi", "category": "cafe"}}"#,
        );
        let state = test_state(store, None, MockReviewSource::new(), backend);
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/chat",
            &serde_json::json!({ "utterance": "cozy cafes in Delhi please" }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["intent"], "place_search");
        assert_eq!(
            body["response"],
            "I found 5 places in delhi that match your criteria."
        );
        assert_eq!(body["count"], 5);
        assert_eq!(body["places"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_chat_detail_intent_formats_place_summary() {
        let mut place = seeded_place("bt-1", "Blue Tokai", "Cafe", "delhi", &["cozy", "quiet"]);
        place.processed.emojis = vec!["☕".to_string()];
        place.reviews = vec![
            review_snippet("https://reddit.com/r/delhi/10"),
            review_snippet("https://reddit.com/r/delhi/11"),
        ];
        let store = Arc::new(MemoryPlaceStore::with_places(vec![place]).await);
        let backend = MockGenerationBackend::new().with_response_for(
            "intent classifier",
            r#"{"intent": "place_detail", "confidence": 0.92, "extracted_data": {"place_name": "Blue Tokai"}}"#,
        );
        let state = test_state(store, None, MockReviewSource::new(), backend);
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/chat",
            &serde_json::json!({ "utterance": "tell me about Blue Tokai" }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["intent"], "place_detail");
        assert_eq!(body["found"], true);
        assert_eq!(body["place"]["external_id"], "bt-1");
        assert_eq!(
            body["response"],
            "Here's what I found about Blue Tokai: It's a Cafe. The vibe is: cozy, quiet. \
             Represented by: ☕ It has 2 reviews from various sources."
        );
    }

    #[tokio::test]
    async fn test_chat_detail_intent_unknown_place() {
        let backend = MockGenerationBackend::new().with_response_for(
            "intent classifier",
            r#"{"intent": "place_detail", "confidence": 0.9, "extracted_data": {"place_name": "Atlantis Cafe"}}"#,
        );
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            backend,
        );
        let base = serve(state).await;

        let (status, body) = post_json(
            &base,
            "/api/v1/chat",
            &serde_json::json!({ "utterance": "tell me about Atlantis Cafe" }),
        )
        .await;

        assert_eq!(status, 200);
        assert_eq!(body["found"], false);
        assert!(body["place"].is_null());
        assert_eq!(
            body["response"],
            "I couldn't find any information about Atlantis Cafe. Please check the spelling or try a different place."
        );
    }

    #[tokio::test]
    async fn test_chat_small_talk_reply() {
        let backend = MockGenerationBackend::new().with_response_for(
            "intent classifier",
            r#"{"intent": "simple_response", "confidence": 0.99, "extracted_data": {"response_text": "Hello! How can I help you find places today?"}}"#,
        );
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            backend,
        );
        let base = serve(state).await;

        let (status, body) =
            post_json(&base, "/api/v1/chat", &serde_json::json!({ "utterance": "hello" })).await;

        assert_eq!(status, 200);
        assert_eq!(body["intent"], "simple_response");
        assert_eq!(body["response"], "Hello! How can I help you find places today?");
        assert_eq!(body["places"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_chat_rejects_blank_utterance() {
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let (status, body) =
            post_json(&base, "/api/v1/chat", &serde_json::json!({ "utterance": "  " })).await;
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "utterance must not be empty");

        // Missing field behaves like blank
        let (status, _) = post_json(&base, "/api/v1/chat", &serde_json::json!({})).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_ingest_then_get_roundtrip() {
        let store = Arc::new(MemoryPlaceStore::new());
        let state = test_state(
            store.clone(),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let documents = serde_json::json!([
            {
                "external_id": "doc-1",
                "original": {
                    "name": "Thalassa",
                    "category": "Beach Shack",
                    "address": "Small Vagator",
                    "locality": "Vagator",
                    "city": "goa",
                    "country": "India",
                    "coordinates": { "lat": 15.6, "lon": 73.73 }
                },
                "processed": { "vibe_tags": ["sunset", "lively"] }
            },
            {
                "external_id": "doc-2",
                "original": {
                    "name": "Gunpowder",
                    "category": "Restaurant",
                    "address": "Assagao",
                    "locality": "Assagao",
                    "city": "goa",
                    "country": "India",
                    "coordinates": { "lat": 15.59, "lon": 73.76 }
                }
            }
        ]);

        let (status, body) = post_json(&base, "/api/v1/places", &documents).await;
        assert_eq!(status, 201);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 2);
        assert_eq!(store.len().await, 2);

        let (status, found) = post_json(
            &base,
            "/api/v1/places/search",
            &serde_json::json!({ "city": "goa", "category": "beach" }),
        )
        .await;
        assert_eq!(status, 200);
        let id = found["places"][0]["id"].as_str().unwrap().to_string();

        let (status, place) = get_json(&base, &format!("/api/v1/places/{}", id)).await;
        assert_eq!(status, 200);
        assert_eq!(place["external_id"], "doc-1");
        assert_eq!(place["processed"]["vibe_tags"], serde_json::json!(["sunset", "lively"]));
    }

    #[tokio::test]
    async fn test_ingest_rejects_unnamed_document() {
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let documents = serde_json::json!([
            {
                "external_id": "doc-1",
                "original": {
                    "name": "",
                    "category": "Cafe",
                    "address": "",
                    "locality": "",
                    "city": "delhi",
                    "country": "India",
                    "coordinates": { "lat": 28.6, "lon": 77.2 }
                }
            }
        ]);

        let (status, body) = post_json(&base, "/api/v1/places", &documents).await;
        assert_eq!(status, 400);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing name for place at index 0");
    }

    #[tokio::test]
    async fn test_get_unknown_place_returns_404() {
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let id = Uuid::now_v7();
        let (status, body) = get_json(&base, &format!("/api/v1/places/{}", id)).await;
        assert_eq!(status, 404);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], format!("Place {} not found", id));
    }

    #[tokio::test]
    async fn test_rate_limit_status_reports_disabled() {
        let state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let base = serve(state).await;

        let (status, body) = get_json(&base, "/api/v1/rate-limit/status").await;
        assert_eq!(status, 200);
        assert_eq!(body["enabled"], false);
    }

    #[tokio::test]
    async fn test_rate_limit_middleware_rejects_over_quota() {
        let mut state = test_state(
            Arc::new(MemoryPlaceStore::new()),
            None,
            MockReviewSource::new(),
            MockGenerationBackend::new(),
        );
        let quota = Quota::with_period(std::time::Duration::from_secs(60))
            .unwrap()
            .allow_burst(NonZeroU32::new(2).unwrap());
        state.rate_limiter = Some(Arc::new(RateLimiter::direct(quota)));
        let base = serve(state).await;

        for _ in 0..2 {
            let (status, _) = get_json(&base, "/health").await;
            assert_eq!(status, 200);
        }
        let (status, body) = get_json(&base, "/health").await;
        assert_eq!(status, 429);
        assert_eq!(body["error"], "rate_limit_exceeded");
    }

    #[test]
    fn test_chat_request_tolerates_missing_utterance() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(request.utterance.is_none());
    }

    #[test]
    fn test_place_document_minimal_shape() {
        let json = r#"{
            "external_id": "d1",
            "original": {
                "name": "Koshy's",
                "category": "Restaurant",
                "address": "39 St Marks Rd",
                "locality": "Shanthala Nagar",
                "city": "bangalore",
                "country": "India",
                "coordinates": { "lat": 12.97, "lon": 77.6 }
            }
        }"#;
        let document: PlaceDocument = serde_json::from_str(json).unwrap();
        assert_eq!(document.external_id, "d1");
        assert!(document.processed.is_empty());
        assert!(document.reviews.is_empty());
    }

    #[test]
    fn test_describe_place_skips_empty_sections() {
        let place = Place::from_candidate(&test_candidate("p1", "Bare Spot", "Park"), "delhi");
        assert_eq!(
            describe_place(&place),
            "Here's what I found about Bare Spot: It's a Park."
        );
    }
}
