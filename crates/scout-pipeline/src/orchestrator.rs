//! Fallback search orchestration.
//!
//! One [`FallbackOrchestrator::search`] call is one pipeline run: a local
//! store search, then (when the store comes up short) a candidate fetch from
//! the directory, per-candidate enrichment in detached tasks, and a final
//! authoritative re-search over the updated store.
//!
//! Only the initial local search is fatal. Every collaborator after it
//! degrades: a failed fetch returns the local matches, a failed harvest
//! falls back to synthetic snippets, a failed summarization persists the
//! place without vibe data, and a failed upsert skips one candidate.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use scout_core::{
    defaults, CandidateSupplier, Error, Place, PlaceQuery, PlaceRepository, RawCandidate,
};
use scout_inference::VibeSummarizer;
use scout_sources::ReviewHarvester;

const SOURCE_DATABASE: &str = "database";
const SOURCE_DATABASE_ONLY: &str = "database_only";

/// Stages of one pipeline run, in execution order. Every transition is
/// logged under the `stage` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    LocalSearch,
    FetchingCandidates,
    Enriching,
    Persisting,
    FinalSearch,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::LocalSearch => "local_search",
            PipelineStage::FetchingCandidates => "fetching_candidates",
            PipelineStage::Enriching => "enriching",
            PipelineStage::Persisting => "persisting",
            PipelineStage::FinalSearch => "final_search",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }
}

/// Result of one pipeline run, shaped for the wire.
///
/// `source` tells the caller what produced the result set: `"database"`
/// (local matches sufficed), `"database_only"` (fallback attempted, no
/// candidates arrived), or `"database_and_<supplier>"` (enrichment ran).
/// `fallback_used` is true whenever the pipeline went past the local
/// search, including attempts that produced nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub success: bool,
    pub places: Vec<Place>,
    pub count: usize,
    pub source: String,
    pub fallback_used: bool,
    pub candidates_fetched: usize,
    pub reviews_harvested: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchOutcome {
    fn local(places: Vec<Place>) -> Self {
        Self {
            success: true,
            count: places.len(),
            places,
            source: SOURCE_DATABASE.to_string(),
            fallback_used: false,
            candidates_fetched: 0,
            reviews_harvested: 0,
            error: None,
        }
    }

    fn local_only(places: Vec<Place>) -> Self {
        Self {
            success: true,
            count: places.len(),
            places,
            source: SOURCE_DATABASE_ONLY.to_string(),
            fallback_used: true,
            candidates_fetched: 0,
            reviews_harvested: 0,
            error: None,
        }
    }

    fn failure(error: &Error) -> Self {
        Self {
            success: false,
            places: Vec::new(),
            count: 0,
            source: SOURCE_DATABASE.to_string(),
            fallback_used: false,
            candidates_fetched: 0,
            reviews_harvested: 0,
            error: Some(error.to_string()),
        }
    }
}

/// Runs the fallback search pipeline.
///
/// Holds the store plus the three enrichment collaborators. The supplier is
/// optional: without one (no directory credentials) insufficient local
/// matches simply come back as `"database_only"`.
pub struct FallbackOrchestrator {
    store: Arc<dyn PlaceRepository>,
    supplier: Option<Arc<dyn CandidateSupplier>>,
    harvester: Arc<ReviewHarvester>,
    summarizer: Arc<VibeSummarizer>,
    unit_timeout: Duration,
}

impl FallbackOrchestrator {
    pub fn new(
        store: Arc<dyn PlaceRepository>,
        supplier: Option<Arc<dyn CandidateSupplier>>,
        harvester: Arc<ReviewHarvester>,
        summarizer: Arc<VibeSummarizer>,
    ) -> Self {
        Self {
            store,
            supplier,
            harvester,
            summarizer,
            unit_timeout: Duration::from_secs(defaults::ENRICH_UNIT_TIMEOUT_SECS),
        }
    }

    /// Override the per-unit enrichment deadline.
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = timeout;
        self
    }

    /// Run one pipeline pass for `query`.
    ///
    /// Never returns an error: fatal failures (the initial store search)
    /// surface as `success: false` in the outcome, everything else degrades
    /// in place. The returned places always reflect a store search taken
    /// after all enrichment units completed or were abandoned on timeout.
    #[instrument(skip(self, query), fields(subsystem = "pipeline", component = "orchestrator", op = "search", city = %query.city, category = %query.category, min_results = query.min_results))]
    pub async fn search(&self, query: &PlaceQuery) -> SearchOutcome {
        let start = Instant::now();

        debug!(
            stage = PipelineStage::LocalSearch.as_str(),
            "Searching local store"
        );
        let local = match self.store.search(query).await {
            Ok(places) => places,
            Err(e) => {
                error!(
                    stage = PipelineStage::Failed.as_str(),
                    error = %e,
                    "Local search failed, aborting run"
                );
                return SearchOutcome::failure(&e);
            }
        };

        if local.len() >= query.min_results {
            info!(
                stage = PipelineStage::Done.as_str(),
                count = local.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Local matches sufficient, skipping fallback"
            );
            return SearchOutcome::local(local);
        }

        let deficit = query.min_results - local.len();

        let supplier = match self.supplier.as_ref() {
            Some(supplier) => supplier,
            None => {
                warn!(
                    stage = PipelineStage::FetchingCandidates.as_str(),
                    found = local.len(),
                    degrade_reason = "no_supplier",
                    "Local matches insufficient but no supplier is configured"
                );
                return SearchOutcome::local_only(local);
            }
        };

        info!(
            stage = PipelineStage::FetchingCandidates.as_str(),
            found = local.len(),
            deficit,
            supplier = supplier.name(),
            "Local matches insufficient, fetching candidates"
        );

        let candidates = match supplier
            .fetch_candidates(&query.city, &query.category, deficit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    degrade_reason = "supplier_failed",
                    error = %e,
                    "Candidate fetch failed, returning local matches"
                );
                return SearchOutcome::local_only(local);
            }
        };

        if candidates.is_empty() {
            info!(
                degrade_reason = "no_candidates",
                "Directory returned no candidates, returning local matches"
            );
            return SearchOutcome::local_only(local);
        }

        let candidates_fetched = candidates.len();
        let fresh = self.discard_known(candidates).await;

        info!(
            stage = PipelineStage::Enriching.as_str(),
            fresh = fresh.len(),
            skipped_known = candidates_fetched - fresh.len(),
            "Dispatching enrichment units"
        );

        let mut units = Vec::with_capacity(fresh.len());
        for candidate in fresh {
            let label = candidate.name.clone();
            // Detached on purpose: if the caller goes away mid-run the
            // units keep running and their upserts still land.
            let handle = tokio::spawn(enrich_candidate(
                Arc::clone(&self.store),
                Arc::clone(&self.harvester),
                Arc::clone(&self.summarizer),
                candidate,
                query.city.clone(),
            ));
            units.push((label, handle));
        }

        let unit_timeout = self.unit_timeout;
        let harvested = future::join_all(units.into_iter().map(|(label, handle)| async move {
            match tokio::time::timeout(unit_timeout, handle).await {
                Ok(Ok(snippets)) => snippets,
                Ok(Err(e)) => {
                    error!(candidate = %label, error = ?e, "Enrichment unit panicked");
                    0
                }
                Err(_) => {
                    warn!(
                        candidate = %label,
                        degrade_reason = "unit_timeout",
                        timeout_ms = unit_timeout.as_millis() as u64,
                        "Enrichment unit timed out, left to finish in the background"
                    );
                    0
                }
            }
        }))
        .await;
        let reviews_harvested: usize = harvested.into_iter().sum();

        info!(
            stage = PipelineStage::FinalSearch.as_str(),
            "Re-running search over the updated store"
        );
        let places = match self.store.search(query).await {
            Ok(places) => places,
            Err(e) => {
                warn!(
                    degrade_reason = "final_search_failed",
                    error = %e,
                    "Final search failed, returning pre-enrichment matches"
                );
                local
            }
        };

        info!(
            stage = PipelineStage::Done.as_str(),
            count = places.len(),
            candidates_fetched,
            reviews_harvested,
            duration_ms = start.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );

        SearchOutcome {
            success: true,
            count: places.len(),
            places,
            source: format!("database_and_{}", supplier.name()),
            fallback_used: true,
            candidates_fetched,
            reviews_harvested,
            error: None,
        }
    }

    /// Drop candidates whose `external_id` is already stored.
    ///
    /// A failed lookup degrades to enriching everything; upsert merging
    /// keeps redundant enrichment harmless.
    async fn discard_known(&self, candidates: Vec<RawCandidate>) -> Vec<RawCandidate> {
        let ids: Vec<String> = candidates.iter().map(|c| c.external_id.clone()).collect();
        let known = match self.store.known_external_ids(&ids).await {
            Ok(known) => known,
            Err(e) => {
                warn!(error = %e, "Known-id lookup failed, enriching all candidates");
                HashSet::new()
            }
        };
        candidates
            .into_iter()
            .filter(|c| !known.contains(&c.external_id))
            .collect()
    }
}

/// Enrich and persist one candidate. Runs as a detached task.
///
/// Returns the number of snippets fed to summarization; the count stands
/// even when the upsert fails, since it measures harvest work done.
async fn enrich_candidate(
    store: Arc<dyn PlaceRepository>,
    harvester: Arc<ReviewHarvester>,
    summarizer: Arc<VibeSummarizer>,
    candidate: RawCandidate,
    city: String,
) -> usize {
    let reviews = harvester.harvest(&candidate.name, &city).await;
    let snippets = reviews.len();

    let summary = summarizer
        .summarize(&candidate.name, &candidate.category, &reviews)
        .await;

    let mut place = Place::from_candidate(&candidate, &city);
    place.processed = summary;
    place.reviews = reviews;

    match store.upsert(place).await {
        Ok(saved) => {
            debug!(
                stage = PipelineStage::Persisting.as_str(),
                external_id = %candidate.external_id,
                place_id = %saved.id,
                snippets,
                "Candidate persisted"
            );
        }
        Err(e) => {
            warn!(
                stage = PipelineStage::Persisting.as_str(),
                external_id = %candidate.external_id,
                degrade_reason = "upsert_failed",
                error = %e,
                "Candidate dropped, upsert failed"
            );
        }
    }

    snippets
}
