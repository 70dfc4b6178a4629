//! Handler for queue statistics.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use fleetdoc_db::models::queue_job::{QueueCounts, LANE_DOCUMENT, LANE_PHOTO};
use fleetdoc_db::repositories::QueueJobRepo;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Backlog thresholds above which a lane reports unhealthy.
const PHOTO_BACKLOG_LIMIT: i64 = 100;
const DOCUMENT_BACKLOG_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct LaneStats {
    #[serde(flatten)]
    pub counts: QueueCounts,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub photo: LaneStats,
    pub document: LaneStats,
    pub healthy: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// GET /api/v1/queue/stats
///
/// Per-lane state counts plus a backlog-based health verdict.
pub async fn queue_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let photo_counts = QueueJobRepo::counts(&state.pool, LANE_PHOTO).await?;
    let document_counts = QueueJobRepo::counts(&state.pool, LANE_DOCUMENT).await?;

    let photo = LaneStats {
        healthy: photo_counts.active + photo_counts.waiting < PHOTO_BACKLOG_LIMIT,
        counts: photo_counts,
    };
    let document = LaneStats {
        healthy: document_counts.active + document_counts.waiting < DOCUMENT_BACKLOG_LIMIT,
        counts: document_counts,
    };

    Ok(Json(ApiResponse::ok(QueueStatsResponse {
        healthy: photo.healthy && document.healthy,
        photo,
        document,
        timestamp: chrono::Utc::now(),
    })))
}
