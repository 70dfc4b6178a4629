//! Handlers for protocol document generation: PDFs and manifests.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use fleetdoc_core::types::DbId;
use fleetdoc_db::models::feature_flag::{FLAG_MANIFEST_GENERATION, FLAG_PDF_GENERATION};
use fleetdoc_db::models::processing_job::{JOB_TYPE_MANIFEST, JOB_TYPE_PDF};
use fleetdoc_db::models::queue_job::{STATUS_ACTIVE, STATUS_WAITING};
use fleetdoc_db::repositories::{ProcessingJobRepo, ProtocolRepo, QueueJobRepo};
use fleetdoc_pipeline::jobs::{self, JobPayload};
use fleetdoc_pipeline::pdf_build::PdfJobData;
use fleetdoc_storage::keys;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::feature_gate::require_feature;
use crate::response::ApiResponse;
use crate::state::AppState;

/// User-facing estimate for queued document builds.
const DOCUMENT_ESTIMATED_TIME: &str = "2-5 minutes";

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct EnqueuedResponse {
    pub job_id: DbId,
    pub estimated_time: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DocumentStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ManifestResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateManifestRequest {
    #[serde(default)]
    pub photo_ids: Vec<DbId>,
}

// ---------------------------------------------------------------------------
// PDF generation
// ---------------------------------------------------------------------------

/// POST /api/v1/protocols/{protocol_id}/generate-pdf
///
/// Queues a document build on the document lane and answers with the
/// job id; the PDF itself is produced by a worker.
pub async fn generate_pdf(
    State(state): State<AppState>,
    Path(protocol_id): Path<DbId>,
    Json(data): Json<PdfJobData>,
) -> AppResult<impl IntoResponse> {
    require_feature(&state, FLAG_PDF_GENERATION).await?;
    require_protocol(&state, protocol_id).await?;

    let job = jobs::enqueue(
        &state.pool,
        &JobPayload::BuildProtocolPdf { protocol_id, data },
        0,
        0,
    )
    .await?;

    tracing::info!(protocol_id, job_id = job.id, "pdf build queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(EnqueuedResponse {
            job_id: job.id,
            estimated_time: DOCUMENT_ESTIMATED_TIME,
        })),
    ))
}

/// GET /api/v1/protocols/{protocol_id}/pdf/status
pub async fn pdf_status(
    State(state): State<AppState>,
    Path(protocol_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    document_status(&state, protocol_id, JOB_TYPE_PDF, "build-protocol-pdf").await
}

// ---------------------------------------------------------------------------
// Manifest generation
// ---------------------------------------------------------------------------

/// POST /api/v1/protocols/{protocol_id}/generate-manifest
pub async fn generate_manifest(
    State(state): State<AppState>,
    Path(protocol_id): Path<DbId>,
    Json(request): Json<GenerateManifestRequest>,
) -> AppResult<impl IntoResponse> {
    require_feature(&state, FLAG_MANIFEST_GENERATION).await?;
    if request.photo_ids.is_empty() {
        return Err(AppError::BadRequest("photoIds array is required".into()));
    }
    require_protocol(&state, protocol_id).await?;

    let job = jobs::enqueue(
        &state.pool,
        &JobPayload::GenerateManifest {
            protocol_id,
            photo_ids: request.photo_ids,
        },
        0,
        0,
    )
    .await?;

    tracing::info!(protocol_id, job_id = job.id, "manifest generation queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(EnqueuedResponse {
            job_id: job.id,
            estimated_time: DOCUMENT_ESTIMATED_TIME,
        })),
    ))
}

/// GET /api/v1/protocols/{protocol_id}/manifest
///
/// 200 with the stored manifest document once generated, 202 while a
/// generation job is pending, 404 when none was ever requested.
pub async fn get_manifest(
    State(state): State<AppState>,
    Path(protocol_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let queued =
        QueueJobRepo::latest_for_protocol(&state.pool, protocol_id, "generate-manifest").await?;
    if let Some(job) = &queued {
        if job.status == STATUS_WAITING || job.status == STATUS_ACTIVE {
            return Ok((
                StatusCode::ACCEPTED,
                Json(ApiResponse::ok(ManifestResponse {
                    status: "processing".into(),
                    url: None,
                    manifest: None,
                    error: None,
                })),
            ));
        }
    }

    let Some(history) =
        ProcessingJobRepo::latest(&state.pool, protocol_id, JOB_TYPE_MANIFEST).await?
    else {
        return Err(AppError::NotFound(format!(
            "no manifest record for protocol {protocol_id}"
        )));
    };

    let manifest = match &history.result_url {
        Some(url) => {
            let key = keys::key_from_url(url).unwrap_or_else(|| url.clone());
            let bytes = state.store.get(&key).await?;
            let document = serde_json::from_slice(&bytes).map_err(|e| {
                AppError::InternalError(format!("stored manifest is not valid JSON: {e}"))
            })?;
            Some(document)
        }
        None => None,
    };

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(ManifestResponse {
            status: history.status,
            url: history.result_url,
            manifest,
            error: history.error_message,
        })),
    ))
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Resolve a document's state from the processing history plus the
/// live queue: a terminal history row wins unless a newer queue job is
/// already in flight.
async fn document_status(
    state: &AppState,
    protocol_id: DbId,
    history_type: &str,
    queue_type: &str,
) -> AppResult<(StatusCode, Json<ApiResponse<DocumentStatusResponse>>)> {
    let queued = QueueJobRepo::latest_for_protocol(&state.pool, protocol_id, queue_type).await?;
    if let Some(job) = &queued {
        if job.status == STATUS_WAITING || job.status == STATUS_ACTIVE {
            return Ok((
                StatusCode::ACCEPTED,
                Json(ApiResponse::ok(DocumentStatusResponse {
                    status: "processing".into(),
                    url: None,
                    error: None,
                    metadata: None,
                })),
            ));
        }
    }

    let Some(history) = ProcessingJobRepo::latest(&state.pool, protocol_id, history_type).await?
    else {
        return Err(AppError::NotFound(format!(
            "no {history_type} record for protocol {protocol_id}"
        )));
    };

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(DocumentStatusResponse {
            status: history.status,
            url: history.result_url,
            error: history.error_message,
            metadata: history.metadata,
        })),
    ))
}

async fn require_protocol(state: &AppState, protocol_id: DbId) -> AppResult<()> {
    if ProtocolRepo::find_by_id(&state.pool, protocol_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("protocol {protocol_id} not found")));
    }
    Ok(())
}
