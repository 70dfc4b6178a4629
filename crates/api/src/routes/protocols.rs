//! Route definitions for protocol documents (PDF and manifest).

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::protocols;
use crate::state::AppState;

/// Routes mounted at `/protocols`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{protocol_id}/generate-pdf", post(protocols::generate_pdf))
        .route("/{protocol_id}/pdf/status", get(protocols::pdf_status))
        .route(
            "/{protocol_id}/generate-manifest",
            post(protocols::generate_manifest),
        )
        .route("/{protocol_id}/manifest", get(protocols::get_manifest))
}
