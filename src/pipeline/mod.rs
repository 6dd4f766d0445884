//! The matching pipeline.
//!
//! One stateless execution per request: intent extraction → embedding →
//! retrieval → ranking → explanation. Every external-model stage carries a
//! timeout and degrades to its documented fallback instead of failing the
//! request; only candidate retrieval is fatal. A degraded-quality result
//! set is always preferred over an error.
//!
//! # Architecture
//!
//! - `retrieve`: hard exclusions, cosine sub-score, filter matching, pool
//! - `rank`: preference score, weighted total, deterministic ordering
//! - `explain`: per-candidate explanation with template fallback

pub mod explain;
pub mod rank;
pub mod retrieve;

use crate::analytics::{record_best_effort, AnalyticsEvent, AnalyticsSink};
use crate::config::MatchingConfig;
use crate::ids::ProfileId;
use crate::intent::{Intent, ParsedIntent};
use crate::model::{Embedder, ExplanationWriter, ExtractionContext, IntentExtractor};
use crate::preferences::{PreferenceSnapshot, PreferenceStore};
use crate::profiles::{ProfileStore, SanitizedProfile};
use explain::Explanation;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Largest page a single request may ask for; every returned match carries
/// an explanation, so this also bounds explanation fan-out.
pub const MAX_LIMIT: usize = 10;

pub const DEFAULT_LIMIT: usize = 5;

/// Candidate with raw sub-scores, filled in across retrieval and ranking.
#[derive(Clone, Debug)]
pub struct ScoredCandidate {
    pub profile: crate::profiles::CandidateProfile,
    /// Cosine similarity in [0, 1]; exactly 0.0 when no intent vector exists.
    pub vector_score: f32,
    /// Learned-preference overlap in [0, 1]; neutral 0.5 when no learned
    /// preferences exist for the user.
    pub preference_score: f32,
    /// Count of satisfied structured filters.
    pub filter_match: u32,
    pub total: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchRequest {
    pub user_id: String,
    pub query_text: String,
    #[serde(default)]
    pub prior_intent: Option<Intent>,
    #[serde(default)]
    pub exclude_ids: Vec<ProfileId>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Sub-scores as exposed to callers: 0–100 scaled, embedding-free.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchScores {
    pub total: f64,
    pub vector: u8,
    pub preference: u8,
    pub filter_match: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchResult {
    pub profile: SanitizedProfile,
    pub explanation: Explanation,
    pub scores: MatchScores,
}

/// Full response: the ranked matches plus the intent that produced them,
/// echoed back so the caller can refine against it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchResponse {
    pub intent: Intent,
    /// True when intent extraction degraded to the fallback parse.
    pub degraded: bool,
    pub matches: Vec<MatchResult>,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No meaningful fallback exists for "no candidates"; retryable.
    #[error("candidate retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),
}

pub struct MatchPipeline {
    extractor: Arc<dyn IntentExtractor>,
    embedder: Arc<dyn Embedder>,
    explainer: Arc<dyn ExplanationWriter>,
    profiles: Arc<dyn ProfileStore>,
    preferences: Arc<dyn PreferenceStore>,
    analytics: Arc<dyn AnalyticsSink>,
    config: MatchingConfig,
}

impl MatchPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extractor: Arc<dyn IntentExtractor>,
        embedder: Arc<dyn Embedder>,
        explainer: Arc<dyn ExplanationWriter>,
        profiles: Arc<dyn ProfileStore>,
        preferences: Arc<dyn PreferenceStore>,
        analytics: Arc<dyn AnalyticsSink>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            extractor,
            embedder,
            explainer,
            profiles,
            preferences,
            analytics,
            config,
        }
    }

    /// Run one full pipeline execution. A request with `prior_intent` set is
    /// a refinement and flows through the identical stages.
    pub async fn run(&self, request: MatchRequest) -> Result<MatchResponse, MatchError> {
        validate(&request)?;

        let snapshot = self.load_preferences(&request.user_id);
        let parsed = self.parse_intent(&request, &snapshot).await;
        let intent_vector = self.embed_intent(&parsed).await;

        let candidates = self
            .profiles
            .candidates()
            .map_err(MatchError::Retrieval)?;

        let mut pool = retrieve::build_pool(
            candidates,
            &request.user_id,
            &parsed.intent,
            intent_vector.as_deref(),
            request.limit,
            request.offset,
            &request.exclude_ids,
            self.config.pool_multiplier,
        );

        rank::rank(&mut pool, &parsed.intent, &snapshot);

        // Pages slice the ranked ordering, so stepping offset by limit
        // walks down the ranking without repeating candidates.
        let pool: Vec<ScoredCandidate> = pool
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .collect();

        let explanations = explain::explain_all(
            self.explainer.as_ref(),
            Duration::from_secs(self.config.explain_timeout_secs),
            &pool,
            &parsed.intent,
        )
        .await;

        let event_name = if request.prior_intent.is_some() {
            "match_refine"
        } else {
            "match_search"
        };
        record_best_effort(
            self.analytics.as_ref(),
            AnalyticsEvent::new(
                event_name,
                &request.user_id,
                json!({
                    "degraded": parsed.degraded,
                    "result_count": pool.len(),
                    "offset": request.offset,
                }),
            ),
        );

        let matches = pool
            .into_iter()
            .zip(explanations)
            .map(|(candidate, explanation)| MatchResult {
                profile: SanitizedProfile::from(&candidate.profile),
                explanation,
                scores: MatchScores {
                    total: candidate.total,
                    vector: scale_percent(candidate.vector_score),
                    preference: scale_percent(candidate.preference_score),
                    filter_match: candidate.filter_match,
                },
            })
            .collect();

        Ok(MatchResponse {
            intent: parsed.intent,
            degraded: parsed.degraded,
            matches,
        })
    }

    /// Preference-store read failures recover as `Absent`: the neutral
    /// score rule, never an error.
    fn load_preferences(&self, user_id: &str) -> PreferenceSnapshot {
        match self.preferences.load(user_id) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("preference read failed for user {}: {:?}", user_id, err);
                PreferenceSnapshot::Absent
            }
        }
    }

    /// Extraction with timeout. Timeout, transport failure and malformed
    /// output all land on the same pinned fallback intent, marked degraded
    /// out-of-band.
    async fn parse_intent(
        &self,
        request: &MatchRequest,
        snapshot: &PreferenceSnapshot,
    ) -> ParsedIntent {
        let context = ExtractionContext {
            prior: request.prior_intent.as_ref(),
            preferences: snapshot.as_loaded(),
        };

        let result = tokio::time::timeout(
            Duration::from_secs(self.config.parse_timeout_secs),
            self.extractor.extract(&request.query_text, context),
        )
        .await;

        match result {
            Ok(Ok(extracted)) => {
                let fresh = Intent::from_extracted(&request.query_text, &extracted);
                let intent = match &request.prior_intent {
                    Some(prior) => Intent::merge_refinement(prior, &fresh, extracted.restated),
                    None => fresh,
                };
                ParsedIntent {
                    intent,
                    degraded: false,
                }
            }
            Ok(Err(err)) => {
                log::warn!("intent extraction failed: {:?}", err);
                ParsedIntent {
                    intent: Intent::fallback(&request.query_text),
                    degraded: true,
                }
            }
            Err(_) => {
                log::warn!(
                    "intent extraction timed out after {}s",
                    self.config.parse_timeout_secs
                );
                ParsedIntent {
                    intent: Intent::fallback(&request.query_text),
                    degraded: true,
                }
            }
        }
    }

    /// Embedding a fallback intent is pointless, so the degraded path skips
    /// the call entirely. Embedding failure degrades to no vector.
    async fn embed_intent(&self, parsed: &ParsedIntent) -> Option<Vec<f32>> {
        if parsed.degraded {
            return None;
        }

        let result = tokio::time::timeout(
            Duration::from_secs(self.config.embed_timeout_secs),
            self.embedder.embed(&parsed.intent.semantic_query),
        )
        .await;

        match result {
            Ok(Ok(vector)) if !vector.is_empty() => Some(vector),
            Ok(Ok(_)) => {
                log::warn!("embedder returned an empty vector");
                None
            }
            Ok(Err(err)) => {
                log::warn!("embedding failed: {:?}", err);
                None
            }
            Err(_) => {
                log::warn!(
                    "embedding timed out after {}s",
                    self.config.embed_timeout_secs
                );
                None
            }
        }
    }
}

fn scale_percent(score: f32) -> u8 {
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

fn validate(request: &MatchRequest) -> Result<(), MatchError> {
    if request.user_id.trim().is_empty() {
        return Err(MatchError::InvalidRequest("user_id is required".to_string()));
    }
    if request.query_text.trim().is_empty() {
        return Err(MatchError::InvalidRequest(
            "query_text must not be blank".to_string(),
        ));
    }
    if request.limit == 0 || request.limit > MAX_LIMIT {
        return Err(MatchError::InvalidRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }
    Ok(())
}
