pub mod health;
pub mod migration;
pub mod photos;
pub mod protocols;
pub mod queue;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /protocols/photos/upload              upload batch (gated)
/// /protocols/photos/{id}/status         processing status
/// /protocols/photos/{id}                delete
/// /protocols/{id}/photos                list
/// /protocols/{id}/generate-pdf          queue PDF build (gated)
/// /protocols/{id}/pdf/status            PDF status
/// /protocols/{id}/generate-manifest     queue manifest (gated)
/// /protocols/{id}/manifest              manifest status / URL
/// /queue/stats                          lane counts and health
/// /migration/start                      run migration (gated)
/// /migration/progress                   live run progress
/// /migration/rollback/{legacy_id}       undo one protocol (gated)
/// /migration/validate/{legacy_id}       check one protocol
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/protocols", photos::router().merge(protocols::router()))
        .nest("/queue", queue::router())
        .nest("/migration", migration::router())
}
