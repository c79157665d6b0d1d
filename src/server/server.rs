use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::recommender::{
    DistanceMetric, EngineStatus, PopularityAlgorithm, RecommendationError, SongId, SongInfo,
    SystemStats, UserPlay,
};
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use super::{log_requests, state::*, ServerConfig};
use crate::metrics;

/// Error body shared by every route.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: Option<String>,
    pub code: u16,
}

/// Wraps an engine error so handlers can `?` it into a response.
#[derive(Debug)]
pub struct ApiError(RecommendationError);

impl From<RecommendationError> for ApiError {
    fn from(err: RecommendationError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        ApiError(RecommendationError::InvalidArgument(detail.into()))
    }

    fn status(&self) -> StatusCode {
        match self.0 {
            RecommendationError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            RecommendationError::NotFound(_) => StatusCode::NOT_FOUND,
            RecommendationError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            RecommendationError::DataError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RecommendationError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            RecommendationError::ComputationFailure(_) | RecommendationError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self.0 {
            RecommendationError::NotReady => "not_ready",
            RecommendationError::NotFound(_) => "not_found",
            RecommendationError::InvalidArgument(_) => "invalid_argument",
            RecommendationError::DataError(_) => "data_error",
            RecommendationError::ComputationFailure(_) => "computation_failure",
            RecommendationError::UpstreamUnavailable(_) => "upstream_unavailable",
            RecommendationError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }
        metrics::record_error(self.kind(), status.as_str());

        let body = ErrorResponse {
            error: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string(),
            detail: Some(self.0.to_string()),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Checks an optional count against `1..=max`, whatever the engine state.
fn to_count(
    name: &str,
    value: Option<i64>,
    max: usize,
) -> std::result::Result<Option<usize>, ApiError> {
    match value {
        Some(v) if v < 1 || v as u64 > max as u64 => Err(ApiError::bad_request(format!(
            "{} must be between 1 and {}, got {}",
            name, max, v
        ))),
        Some(v) => Ok(Some(v as usize)),
        None => Ok(None),
    }
}

#[derive(Serialize)]
struct HomeResponse {
    message: &'static str,
    version: &'static str,
    uptime: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    Json(HomeResponse {
        message: "MW Music Recommender API is running",
        version: env!("CARGO_PKG_VERSION"),
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: String,
    recommendation_engine: EngineStatus,
}

async fn health(State(engine): State<GuardedEngine>) -> Response {
    let recommendation_engine = engine.status();
    match engine.provider().health_check().await {
        Ok(()) => Json(HealthResponse {
            status: "healthy",
            database: "healthy".to_string(),
            recommendation_engine,
        })
        .into_response(),
        Err(err) => {
            error!("Database health check failed: {:#}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    database: format!("unhealthy: {:#}", err),
                    recommendation_engine,
                }),
            )
                .into_response()
        }
    }
}

#[derive(Deserialize, Debug)]
struct SimilarSongsBody {
    song_id: i64,
    k: Option<i64>,
    metric: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SimilarSongsResponse {
    pub song_id: SongId,
    pub similar_songs: Vec<SongInfo>,
    pub algorithm: String,
    pub metric: String,
}

async fn similar_songs(
    State(engine): State<GuardedEngine>,
    body: std::result::Result<Json<SimilarSongsBody>, JsonRejection>,
) -> ApiResult<SimilarSongsResponse> {
    let Json(body) = body?;
    if body.song_id <= 0 {
        return Err(ApiError::bad_request(format!(
            "song_id must be positive, got {}",
            body.song_id
        )));
    }
    let metric = match body.metric.as_deref() {
        None => DistanceMetric::default(),
        Some(name) => DistanceMetric::parse(name).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Unknown metric '{}', expected cosine or euclidean",
                name
            ))
        })?,
    };
    let k = to_count("k", body.k, engine.settings().limits.max_k_neighbors)?;

    let song_id = SongId(body.song_id);
    let similar_songs = engine.find_similar_songs(song_id, k, metric).await?;
    Ok(Json(SimilarSongsResponse {
        song_id,
        similar_songs,
        algorithm: "collaborative_filtering_knn".to_string(),
        metric: metric.as_str().to_string(),
    }))
}

#[derive(Deserialize, Debug)]
struct ContentBasedBody {
    song_title: String,
    n_recommendations: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ContentBasedResponse {
    pub query_title: String,
    pub matched_title: String,
    pub recommendations: Vec<SongInfo>,
    pub algorithm: String,
}

async fn content_based(
    State(engine): State<GuardedEngine>,
    body: std::result::Result<Json<ContentBasedBody>, JsonRejection>,
) -> ApiResult<ContentBasedResponse> {
    let Json(body) = body?;
    if body.song_title.trim().is_empty() {
        return Err(ApiError::bad_request("song_title must not be empty".to_string()));
    }
    let n = to_count(
        "n_recommendations",
        body.n_recommendations,
        engine.settings().limits.max_k_neighbors,
    )?;

    let found = engine
        .get_content_based_recommendations(&body.song_title, n)
        .await?;
    Ok(Json(ContentBasedResponse {
        query_title: body.song_title,
        matched_title: found.matched_title,
        recommendations: found.songs,
        algorithm: "content_based_filtering".to_string(),
    }))
}

#[derive(Deserialize, Debug)]
struct PopularParams {
    limit: Option<i64>,
    algorithm: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PopularSongsResponse {
    pub popular_songs: Vec<SongInfo>,
    pub algorithm: String,
    pub limit: usize,
}

async fn popular_songs(
    State(engine): State<GuardedEngine>,
    params: std::result::Result<Query<PopularParams>, QueryRejection>,
) -> ApiResult<PopularSongsResponse> {
    let Query(params) = params?;
    let algorithm = match params.algorithm.as_deref() {
        None => PopularityAlgorithm::default(),
        Some(name) => PopularityAlgorithm::parse(name).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Unknown algorithm '{}', expected bayesian or frequency",
                name
            ))
        })?,
    };
    let limit = to_count(
        "limit",
        params.limit,
        engine.settings().limits.max_recommendations,
    )?;

    let popular_songs = engine.get_popular_songs(limit, algorithm).await?;
    Ok(Json(PopularSongsResponse {
        popular_songs,
        algorithm: algorithm.as_str().to_string(),
        limit: limit.unwrap_or(engine.settings().limits.default_recommendations),
    }))
}

async fn song_details(
    State(engine): State<GuardedEngine>,
    song_id: std::result::Result<Path<i64>, PathRejection>,
) -> Response {
    let song_id = match song_id {
        Ok(Path(id)) => SongId(id),
        Err(rejection) => return ApiError::from(rejection).into_response(),
    };
    match engine.get_song_details(song_id).await {
        Ok(details) => Json(details).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

#[derive(Deserialize, Debug)]
struct SearchParams {
    limit: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SongInfo>,
    pub total_found: usize,
}

async fn search_songs(
    State(engine): State<GuardedEngine>,
    query: std::result::Result<Path<String>, PathRejection>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<SearchResponse> {
    let Path(query) = query?;
    let Query(params) = params?;
    let limit = to_count(
        "limit",
        params.limit,
        engine.settings().limits.max_recommendations,
    )?;

    let results = engine.search_songs(&query, limit).await?;
    Ok(Json(SearchResponse {
        total_found: results.len(),
        query,
        results,
    }))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserHistoryResponse {
    pub user_id: String,
    pub history: Vec<UserPlay>,
    pub total_plays: u64,
}

async fn user_history(
    State(engine): State<GuardedEngine>,
    user_id: std::result::Result<Path<String>, PathRejection>,
) -> ApiResult<UserHistoryResponse> {
    let Path(user_id) = user_id?;
    let history = engine.user_history(&user_id).await?;
    Ok(Json(UserHistoryResponse {
        total_plays: history.iter().map(|p| p.plays).sum(),
        user_id,
        history,
    }))
}

async fn stats(State(engine): State<GuardedEngine>) -> ApiResult<SystemStats> {
    Ok(Json(engine.get_system_stats().await?))
}

async fn reinitialize(State(engine): State<GuardedEngine>) -> ApiResult<EngineStatus> {
    info!("Reinitialization requested");
    Ok(Json(engine.initialize().await?))
}

pub fn make_app(config: ServerConfig, engine: GuardedEngine) -> Router {
    let state = ServerState::new(config, engine);

    let recommendation_routes: Router = Router::new()
        .route("/similar-songs", post(similar_songs))
        .route("/content-based", post(content_based))
        .route("/popular", get(popular_songs))
        .with_state(state.clone());

    let song_routes: Router = Router::new()
        .route("/{song_id}", get(song_details))
        .route("/search/{query}", get(search_songs))
        .with_state(state.clone());

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/users/{user_id}/history", get(user_history))
        .route("/admin/reinitialize", post(reinitialize))
        .with_state(state.clone())
        .nest("/recommendations", recommendation_routes)
        .nest("/songs", song_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
        .layer(CorsLayer::permissive())
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(engine: GuardedEngine, config: ServerConfig) -> Result<()> {
    let metrics_listener = tokio::net::TcpListener::bind(("0.0.0.0", config.metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", config.metrics_port))?;
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, make_metrics_app()).await {
            error!("Metrics server stopped: {}", err);
        }
    });

    let port = config.port;
    let app = make_app(config, engine);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;

    Ok(axum::serve(listener, app).await?)
}
