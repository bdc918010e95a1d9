use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheConfig, CacheStats, ScenarioCache};
use crate::coach::MockCoach;
use crate::game::Decision;
use crate::kv::MemoryKv;
use crate::pipeline::{PipelineConfig, PipelineError, ScenarioPipeline};
use crate::progress::{DetailedStats, SkillLevel};
use crate::session::{
    DecisionOutcome, Diagnostics, RoundView, SessionConfig, SessionError, SessionState,
    TrainingSession,
};
use crate::store::MemoryScenarioStore;
use crate::trainer::{TrainerConfig, build_pipeline};

#[derive(Clone)]
struct AppState {
    pipeline: ScenarioPipeline,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<TrainingSession>>>>>,
}

impl AppState {
    fn new(pipeline: ScenarioPipeline) -> Self {
        Self {
            pipeline,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn insert_session(&self, session: TrainingSession) -> Arc<Mutex<TrainingSession>> {
        let id = session.id();
        let entry = Arc::new(Mutex::new(session));
        self.sessions.write().insert(id, entry.clone());
        entry
    }

    fn get_session(&self, id: &Uuid) -> Option<Arc<Mutex<TrainingSession>>> {
        self.sessions.read().get(id).cloned()
    }
}

#[derive(Debug, Deserialize)]
struct StartSessionRequest {
    user_id: String,
    level: Option<SkillLevel>,
    focus_area: Option<String>,
    seed: Option<u64>,
    #[serde(default)]
    coach_notes: bool,
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    decision: Decision,
}

#[derive(Debug, Deserialize)]
struct StatsQuery {
    days: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("session not found")]
    NotFound,
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::NoActiveRound) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::Pipeline(PipelineError::Exhausted { .. })) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

pub async fn serve(addr: SocketAddr, config: TrainerConfig) -> Result<()> {
    let pipeline = build_pipeline(&config).await?;
    let app = router_with(pipeline);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "web api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(fetch_session))
        .route("/sessions/:id/next", post(next_round))
        .route("/sessions/:id/decisions", post(decide))
        .route("/sessions/:id/stats", get(session_stats))
        .route("/sessions/:id/diagnostics", get(session_diagnostics))
        .route("/cache", get(cache_stats).delete(clear_cache));

    Router::new()
        .route("/healthz", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// In-memory pipeline with the mock coach.
pub fn router() -> Router {
    let cache = Arc::new(ScenarioCache::new(
        Arc::new(MemoryKv::new()),
        CacheConfig::default(),
    ));
    let pipeline = ScenarioPipeline::new(
        cache,
        Arc::new(MemoryScenarioStore::new()),
        Arc::new(MockCoach::new(None)),
        PipelineConfig::default(),
    );
    router_with(pipeline)
}

/// Router over a caller-supplied pipeline.
pub fn router_with(pipeline: ScenarioPipeline) -> Router {
    build_router(AppState::new(pipeline))
}

async fn health() -> &'static str {
    "ok"
}

async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> Result<Json<SessionState>, ApiError> {
    let config = SessionConfig {
        coach_notes: req.coach_notes,
        seed: req.seed,
        ..SessionConfig::default()
    };
    let mut session = TrainingSession::start(req.user_id, state.pipeline.clone(), config).await;
    if req.level.is_some() || req.focus_area.is_some() {
        let level = req.level.unwrap_or(session.progress().level);
        let focus_area = req
            .focus_area
            .unwrap_or_else(|| session.progress().current_focus.clone());
        session.set_training(level, focus_area);
    }
    let snapshot = session.snapshot();
    state.insert_session(session);
    Ok(Json(snapshot))
}

async fn fetch_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionState>, ApiError> {
    let session_arc = state.get_session(&id).ok_or(ApiError::NotFound)?;
    let session = session_arc.lock().await;
    Ok(Json(session.snapshot()))
}

async fn next_round(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoundView>, ApiError> {
    let session_arc = state.get_session(&id).ok_or(ApiError::NotFound)?;
    let mut session = session_arc.lock().await;
    Ok(Json(session.next_round().await?))
}

async fn decide(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<DecisionOutcome>, ApiError> {
    let session_arc = state.get_session(&id).ok_or(ApiError::NotFound)?;
    let mut session = session_arc.lock().await;
    Ok(Json(session.decide(req.decision).await?))
}

async fn session_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DetailedStats>, ApiError> {
    let session_arc = state.get_session(&id).ok_or(ApiError::NotFound)?;
    let session = session_arc.lock().await;
    Ok(Json(session.detailed_stats(query.days.unwrap_or(30)).await))
}

async fn session_diagnostics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Diagnostics>, ApiError> {
    let session_arc = state.get_session(&id).ok_or(ApiError::NotFound)?;
    let session = session_arc.lock().await;
    Ok(Json(session.diagnostics().await))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.pipeline.cache().stats().await)
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    cleared: usize,
}

async fn clear_cache(State(state): State<AppState>) -> Response {
    match state.pipeline.cache().clear(None).await {
        Ok(cleared) => Json(ClearResponse { cleared }).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: err.to_string(),
            }),
        )
            .into_response(),
    }
}
