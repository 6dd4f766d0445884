use crate::config::Config;
use crate::pack::{PackService, PackSubmission};
use crate::pipeline::{MatchError, MatchPipeline, MatchRequest, DEFAULT_LIMIT};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{collections::HashMap, sync::Arc, sync::Mutex};
use tokio::signal;

/// Per-user request sequence for last-write-wins at the boundary. A
/// superseding refinement bumps the sequence; an older in-flight request
/// finds its ticket stale on completion and its output is discarded instead
/// of being applied.
pub struct RequestSequencer {
    seqs: Mutex<HashMap<String, u64>>,
}

/// Cap on tracked users. When the table fills it is reset wholesale: the
/// only cost is that one already-superseded response per reset may slip
/// through, and the table never grows without bound in a long-lived daemon.
const MAX_TRACKED_USERS: usize = 8192;

impl RequestSequencer {
    pub fn new() -> Self {
        Self {
            seqs: Mutex::new(HashMap::new()),
        }
    }

    pub fn begin(&self, user_id: &str) -> u64 {
        let mut seqs = self.seqs.lock().unwrap();
        if seqs.len() >= MAX_TRACKED_USERS && !seqs.contains_key(user_id) {
            seqs.clear();
        }
        let entry = seqs.entry(user_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn is_current(&self, user_id: &str, ticket: u64) -> bool {
        let seqs = self.seqs.lock().unwrap();
        seqs.get(user_id).map(|seq| *seq == ticket).unwrap_or(false)
    }
}

impl Default for RequestSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct SharedState {
    pipeline: Arc<MatchPipeline>,
    pack: Arc<PackService>,
    sequencer: Arc<RequestSequencer>,
}

impl IntoResponse for MatchError {
    fn into_response(self) -> Response {
        match self {
            MatchError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": msg })),
            )
                .into_response(),
            MatchError::Retrieval(err) => {
                log::error!("candidate retrieval failed: {:?}", err);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({
                        "error": "candidate retrieval failed",
                        "retryable": true,
                    })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    user_id: String,
    query: String,
    #[serde(default)]
    exclude_ids: Vec<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct RefineRequest {
    user_id: String,
    query: String,
    prior_intent: crate::intent::Intent,
    #[serde(default)]
    exclude_ids: Vec<String>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

#[derive(Debug, Deserialize)]
struct PackRoundRequest {
    user_id: String,
    round_number: u32,
    submissions: Vec<PackSubmission>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Response, MatchError> {
    let ticket = state.sequencer.begin(&payload.user_id);

    let response = state
        .pipeline
        .run(MatchRequest {
            user_id: payload.user_id.clone(),
            query_text: payload.query,
            prior_intent: None,
            exclude_ids: payload.exclude_ids.into_iter().map(Into::into).collect(),
            limit: payload.limit,
            offset: payload.offset,
        })
        .await?;

    if !state.sequencer.is_current(&payload.user_id, ticket) {
        log::info!("dropping stale search result for user {}", payload.user_id);
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({ "error": "superseded by a newer request" })),
        )
            .into_response());
    }

    Ok(Json(response).into_response())
}

async fn refine(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<RefineRequest>,
) -> Result<Response, MatchError> {
    let ticket = state.sequencer.begin(&payload.user_id);

    let response = state
        .pipeline
        .run(MatchRequest {
            user_id: payload.user_id.clone(),
            query_text: payload.query,
            prior_intent: Some(payload.prior_intent),
            exclude_ids: payload.exclude_ids.into_iter().map(Into::into).collect(),
            limit: payload.limit,
            offset: payload.offset,
        })
        .await?;

    if !state.sequencer.is_current(&payload.user_id, ticket) {
        log::info!("dropping stale refine result for user {}", payload.user_id);
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({ "error": "superseded by a newer request" })),
        )
            .into_response());
    }

    Ok(Json(response).into_response())
}

async fn pack_round(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<PackRoundRequest>,
) -> Result<Response, MatchError> {
    let round = state
        .pack
        .open_round(
            &payload.user_id,
            payload.round_number,
            &payload.submissions,
            payload.limit,
        )
        .await?;

    Ok(Json(round).into_response())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn start_app(config: Config, pipeline: Arc<MatchPipeline>, pack: Arc<PackService>) {
    let shared_state = Arc::new(SharedState {
        pipeline,
        pack,
        sequencer: Arc::new(RequestSequencer::new()),
    });

    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    let app = Router::new()
        .route("/api/match/search", post(search))
        .route("/api/match/refine", post(refine))
        .route("/api/pack/round", post(pack_round))
        .route("/api/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind(&config.listen).await.unwrap();
    log::info!("listening on {}", config.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

pub fn start_daemon(config: Config, pipeline: Arc<MatchPipeline>, pack: Arc<PackService>) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(config, pipeline, pack).await });
}
