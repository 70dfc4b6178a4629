//! Route definitions for protocol photos.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::photos;
use crate::state::AppState;

/// Routes mounted at `/protocols`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/photos/upload", post(photos::upload_photos))
        .route("/photos/{id}/status", get(photos::photo_status))
        .route("/photos/{id}", delete(photos::delete_photo))
        .route("/{protocol_id}/photos", get(photos::list_photos))
}
