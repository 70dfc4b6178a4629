//! Handlers for legacy protocol migration.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use fleetdoc_core::types::DbId;
use fleetdoc_db::models::feature_flag::FLAG_MIGRATION;
use fleetdoc_pipeline::migration::{MigrationOptions, MigrationProgress};
use serde::Serialize;

use crate::error::AppResult;
use crate::middleware::feature_gate::require_feature;
use crate::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub is_running: bool,
    #[serde(flatten)]
    pub progress: MigrationProgress,
}

/// POST /api/v1/migration/start
///
/// Runs the migration synchronously and answers with the full report.
/// Progress is observable concurrently via `GET /migration/progress`.
pub async fn start_migration(
    State(state): State<AppState>,
    Json(options): Json<MigrationOptions>,
) -> AppResult<impl IntoResponse> {
    require_feature(&state, FLAG_MIGRATION).await?;
    let report = state.migration.run(&options).await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/v1/migration/progress
pub async fn migration_progress(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let progress = state.migration.progress().await;
    Ok(Json(ApiResponse::ok(ProgressResponse {
        is_running: progress.is_running(),
        progress,
    })))
}

/// POST /api/v1/migration/rollback/{legacy_id}
pub async fn rollback_migration(
    State(state): State<AppState>,
    Path(legacy_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    require_feature(&state, FLAG_MIGRATION).await?;
    let report = state.migration.rollback(legacy_id).await?;
    tracing::info!(legacy_id, deleted = report.protocol_deleted, "migration rolled back");
    Ok(Json(ApiResponse::ok(report)))
}

/// GET /api/v1/migration/validate/{legacy_id}
pub async fn validate_migration(
    State(state): State<AppState>,
    Path(legacy_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = state.migration.validate(legacy_id).await?;
    Ok(Json(ApiResponse::ok(report)))
}
