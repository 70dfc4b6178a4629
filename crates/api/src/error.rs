use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleetdoc_core::error::CoreError;
use fleetdoc_pipeline::PipelineError;
use fleetdoc_storage::StorageError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain error types and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error bodies
/// with `"success": false`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The feature flag gating this route is disabled.
    #[error("Feature disabled: {0}")]
    FeatureDisabled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = classify(&self);

        let body = json!({
            "success": false,
            "error": message,
            "code": code,
        });
        (status, axum::Json(body)).into_response()
    }
}

fn classify(err: &AppError) -> (StatusCode, &'static str, String) {
    match err {
        AppError::Core(core) => classify_core(core),

        AppError::Pipeline(pipeline) => match pipeline {
            PipelineError::Core(core) => classify_core(core),
            PipelineError::Storage(storage) => classify_storage(storage),
            PipelineError::Db(db) => classify_sqlx_error(db),
            PipelineError::PhotoNotFound(id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("photo {id} not found"),
            ),
            PipelineError::ProtocolNotFound(id) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("protocol {id} not found"),
            ),
            PipelineError::NoPhotos => (
                StatusCode::BAD_REQUEST,
                "NO_PHOTOS",
                pipeline.to_string(),
            ),
            PipelineError::Download { .. } => {
                tracing::error!(error = %pipeline, "Upstream download failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "DOWNLOAD_FAILED",
                    pipeline.to_string(),
                )
            }
            PipelineError::Payload(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
            }
        },

        AppError::Storage(storage) => classify_storage(storage),
        AppError::Database(db) => classify_sqlx_error(db),

        AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        AppError::FeatureDisabled(flag) => (
            StatusCode::FORBIDDEN,
            "FEATURE_DISABLED",
            format!("feature '{flag}' is currently disabled"),
        ),
        AppError::InternalError(msg) => {
            tracing::error!(error = %msg, "Internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

fn classify_core(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Imaging(msg) => (StatusCode::BAD_REQUEST, "INVALID_IMAGE", msg.clone()),
        CoreError::Hashing(msg) | CoreError::Pdf(msg) => {
            tracing::error!(error = %msg, "Processing error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROCESSING_ERROR",
                msg.clone(),
            )
        }
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

fn classify_storage(err: &StorageError) -> (StatusCode, &'static str, String) {
    match err {
        StorageError::NotFound { key } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("object '{key}' not found"),
        ),
        other => {
            tracing::error!(error = %other, "Storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Object storage operation failed".to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (PostgreSQL code 23505) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return (
                    StatusCode::CONFLICT,
                    "CONFLICT",
                    format!("Duplicate value violates unique constraint: {constraint}"),
                );
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
