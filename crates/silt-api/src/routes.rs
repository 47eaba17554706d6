use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use silt_core::{
    Conflict, ConflictFilter, ConflictStats, ConflictStatus, Kind, Resolution, SyncReport,
    SyncService,
};

use crate::error::ApiError;
use crate::wire::{decode_resolve_body, decode_sync_request, validate_batch, ApiResponse};

#[derive(Clone)]
pub struct AppState {
    pub service: SyncService,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sync", post(sync_batch))
        .route("/api/sync/health", get(sync_health))
        .route("/api/conflicts", get(list_conflicts))
        .route("/api/conflicts/stats", get(conflict_stats))
        .route("/api/conflicts/:id", get(get_conflict))
        .route("/api/conflicts/:id/resolve", put(resolve_conflict))
        .route("/api/conflicts/:id/dismiss", put(dismiss_conflict))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn sync_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn sync_batch(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let request = decode_sync_request(body)?;
    validate_batch(&request)?;
    let report = state.service.process_batch(&request.operations).await;
    Ok(Json(ApiResponse::new("Sync completed", report)))
}

#[derive(Debug, Deserialize)]
struct ConflictListQuery {
    status: Option<ConflictStatus>,
    kind: Option<Kind>,
    limit: Option<usize>,
}

/// Listings are always bounded; 500 is the hard ceiling.
const MAX_CONFLICT_LIST_LIMIT: usize = 500;

async fn list_conflicts(
    State(state): State<AppState>,
    Query(query): Query<ConflictListQuery>,
) -> Result<Json<ApiResponse<Vec<Conflict>>>, ApiError> {
    let filter = ConflictFilter {
        status: query.status,
        kind: query.kind,
        limit: query
            .limit
            .unwrap_or(ConflictFilter::default().limit)
            .min(MAX_CONFLICT_LIST_LIMIT),
    };
    let conflicts = state.service.list_conflicts(&filter).await?;
    Ok(Json(ApiResponse::new("Conflicts retrieved", conflicts)))
}

async fn conflict_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ConflictStats>>, ApiError> {
    let stats = state.service.conflict_stats().await?;
    Ok(Json(ApiResponse::new("Conflict stats retrieved", stats)))
}

async fn get_conflict(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Conflict>>, ApiError> {
    let conflict = state
        .service
        .get_conflict(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("conflict {id} not found")))?;
    Ok(Json(ApiResponse::new("Conflict retrieved", conflict)))
}

async fn resolve_conflict(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<Conflict>>, ApiError> {
    let body = decode_resolve_body(body)?;
    if body.resolution == Resolution::Custom && body.resolved_data.is_none() {
        return Err(ApiError::bad_request(
            "resolvedData is required for CUSTOM resolution",
        ));
    }
    let conflict = state
        .service
        .resolve_conflict(&id, body.resolution, body.resolved_data)
        .await?;
    Ok(Json(ApiResponse::new("Conflict resolved", conflict)))
}

async fn dismiss_conflict(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Conflict>>, ApiError> {
    let conflict = state.service.dismiss_conflict(&id).await?;
    Ok(Json(ApiResponse::new("Conflict dismissed", conflict)))
}
