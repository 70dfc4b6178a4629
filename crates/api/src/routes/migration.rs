//! Route definitions for legacy migration.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::migration;
use crate::state::AppState;

/// Routes mounted at `/migration`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(migration::start_migration))
        .route("/progress", get(migration::migration_progress))
        .route("/rollback/{legacy_id}", post(migration::rollback_migration))
        .route("/validate/{legacy_id}", get(migration::validate_migration))
}
