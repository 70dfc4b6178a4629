//! Tests for `AppError` → HTTP response mapping.
//!
//! These tests verify that each `AppError` variant produces the correct
//! HTTP status code, error code, and message. They do NOT need an HTTP
//! server -- they call `IntoResponse` directly on `AppError` values.

use axum::response::IntoResponse;
use fleetdoc_api::error::AppError;
use fleetdoc_core::error::CoreError;
use fleetdoc_pipeline::PipelineError;
use fleetdoc_storage::StorageError;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (axum::http::StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::NotFound maps to 404 with NOT_FOUND code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Protocol",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Protocol with id 42 not found");
}

// ---------------------------------------------------------------------------
// Test: CoreError::Validation maps to 400 with VALIDATION_ERROR code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("image too small".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"], "image too small");
}

// ---------------------------------------------------------------------------
// Test: CoreError::Imaging maps to 400 with INVALID_IMAGE code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn imaging_error_returns_400() {
    let err = AppError::Core(CoreError::Imaging("undecodable image data".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_IMAGE");
}

// ---------------------------------------------------------------------------
// Test: FeatureDisabled maps to 403 with FEATURE_DISABLED code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn feature_disabled_returns_403() {
    let err = AppError::FeatureDisabled("protocol_pdf_generation".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FEATURE_DISABLED");
    assert_eq!(
        json["error"],
        "feature 'protocol_pdf_generation' is currently disabled"
    );
}

// ---------------------------------------------------------------------------
// Test: pipeline lookup failures map to 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pipeline_photo_not_found_returns_404() {
    let err = AppError::Pipeline(PipelineError::PhotoNotFound(17));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "photo 17 not found");
}

#[tokio::test]
async fn pipeline_download_failure_returns_502() {
    let err = AppError::Pipeline(PipelineError::Download {
        url: "https://legacy.example.com/p/1.jpg".into(),
        message: "connection refused".into(),
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "DOWNLOAD_FAILED");
}

// ---------------------------------------------------------------------------
// Test: storage errors sanitize backend details
// ---------------------------------------------------------------------------

#[tokio::test]
async fn storage_backend_error_returns_500_and_sanitizes() {
    let err = AppError::Storage(StorageError::Backend {
        message: "secret bucket credentials rejected".into(),
        retryable: false,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "STORAGE_ERROR");
    assert!(
        !json.to_string().contains("secret"),
        "Storage error response must not leak backend details"
    );
}

// ---------------------------------------------------------------------------
// Test: InternalError maps to 500 and sanitizes the message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("secret database credentials leaked".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(
        !json.to_string().contains("secret"),
        "Internal error response must not leak sensitive details"
    );
    assert_eq!(json["error"], "An internal error occurred");
}
