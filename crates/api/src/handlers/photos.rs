//! Handlers for protocol photo upload, status, listing, and deletion.

use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use fleetdoc_core::imaging;
use fleetdoc_core::types::DbId;
use fleetdoc_db::models::feature_flag::FLAG_PHOTO_UPLOAD;
use fleetdoc_db::models::photo::{CreatePhoto, PhotoDerivative};
use fleetdoc_db::models::queue_job::{STATUS_ACTIVE, STATUS_WAITING};
use fleetdoc_db::repositories::{PhotoRepo, ProtocolRepo, QueueJobRepo};
use fleetdoc_pipeline::jobs::{self, JobPayload};
use fleetdoc_storage::keys;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::feature_gate::require_feature;
use crate::response::ApiResponse;
use crate::state::AppState;

const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Per-file outcome in the upload response.
#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub uploaded: usize,
    pub failed: usize,
    pub results: Vec<UploadResult>,
}

#[derive(Debug, Serialize)]
pub struct PhotoStatusResponse {
    pub photo_id: DbId,
    pub status: String,
    /// Live queue progress while a job is in flight, otherwise the
    /// last persisted checkpoint.
    pub progress: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gallery_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PhotoListResponse {
    pub photos: Vec<PhotoDerivative>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

struct UploadedFile {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// POST /api/v1/protocols/photos/upload
///
/// Multipart upload of up to `max_upload_files` photos for one
/// protocol. Files are accepted or rejected individually; one bad file
/// never fails the batch.
pub async fn upload_photos(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    require_feature(&state, FLAG_PHOTO_UPLOAD).await?;

    let mut protocol_id: Option<DbId> = None;
    let mut user_id: Option<String> = None;
    let mut metadata: Option<serde_json::Value> = None;
    let mut files: Vec<UploadedFile> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("protocol_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                protocol_id = Some(
                    text.parse()
                        .map_err(|_| AppError::BadRequest(format!("invalid protocol_id: {text}")))?,
                );
            }
            Some("user_id") => {
                user_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?,
                );
            }
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                metadata = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| AppError::BadRequest(format!("invalid metadata: {e}")))?,
                );
            }
            Some("photos") => {
                if files.len() >= state.config.max_upload_files {
                    return Err(AppError::BadRequest(format!(
                        "too many files: at most {} per request",
                        state.config.max_upload_files
                    )));
                }
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("failed to read '{filename}': {e}")))?;
                files.push(UploadedFile {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let protocol_id =
        protocol_id.ok_or_else(|| AppError::BadRequest("protocol_id is required".into()))?;
    if files.is_empty() {
        return Err(AppError::BadRequest("no files in request".into()));
    }
    if ProtocolRepo::find_by_id(&state.pool, protocol_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("protocol {protocol_id} not found")));
    }

    let mut results = Vec::with_capacity(files.len());
    for file in files {
        let filename = file.filename.clone();
        match accept_file(&state, protocol_id, user_id.clone(), file, metadata.as_ref()).await {
            Ok(photo_id) => results.push(UploadResult {
                filename,
                success: true,
                photo_id: Some(photo_id),
                error: None,
            }),
            Err(e) => {
                tracing::warn!(protocol_id, filename = %filename, error = %e, "upload rejected");
                results.push(UploadResult {
                    filename,
                    success: false,
                    photo_id: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    let uploaded = results.iter().filter(|r| r.success).count();
    Ok(Json(ApiResponse::ok(UploadResponse {
        failed: results.len() - uploaded,
        uploaded,
        results,
    })))
}

/// Validate, store, persist, and enqueue one uploaded file.
async fn accept_file(
    state: &AppState,
    protocol_id: DbId,
    user_id: Option<String>,
    file: UploadedFile,
    metadata: Option<&serde_json::Value>,
) -> AppResult<DbId> {
    if !ACCEPTED_TYPES.contains(&file.content_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "unsupported content type '{}': expected JPEG, PNG, or WebP",
            file.content_type
        )));
    }
    if file.bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::BadRequest(format!(
            "file exceeds the {} byte limit",
            state.config.max_upload_bytes
        )));
    }
    imaging::validate(&file.bytes)?;

    // Insert first: the storage key embeds the generated photo id.
    let photo = PhotoRepo::create(
        &state.pool,
        &CreatePhoto {
            protocol_id,
            original_url: String::new(),
            original_filename: Some(file.filename.clone()),
            mime_type: Some(file.content_type.clone()),
            original_size: file.bytes.len() as i64,
        },
    )
    .await?;

    let extension = match file.content_type.as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    };
    let key = keys::original_key(protocol_id, photo.photo_id, extension);
    let url = state
        .store
        .put(&key, file.bytes, &file.content_type)
        .await?;
    PhotoRepo::set_original_url(&state.pool, photo.photo_id, &url).await?;

    if let Some(metadata) = metadata {
        PhotoRepo::save_metadata(&state.pool, photo.photo_id, protocol_id, metadata).await?;
    }

    jobs::enqueue(
        &state.pool,
        &JobPayload::GenerateDerivatives {
            protocol_id,
            photo_id: photo.photo_id,
            user_id,
        },
        0,
        0,
    )
    .await?;

    Ok(photo.photo_id)
}

// ---------------------------------------------------------------------------
// Status / listing / deletion
// ---------------------------------------------------------------------------

/// GET /api/v1/protocols/photos/{id}/status
pub async fn photo_status(
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let photo = PhotoRepo::find_by_id(&state.pool, photo_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("photo {photo_id} not found")))?;

    // Prefer the in-flight job's progress over the persisted checkpoint.
    let mut progress = photo.processing_progress;
    if let Some(job) = QueueJobRepo::latest_for_photo(&state.pool, photo_id).await? {
        if job.status == STATUS_ACTIVE || job.status == STATUS_WAITING {
            progress = job.progress;
        }
    }

    Ok(Json(ApiResponse::ok(PhotoStatusResponse {
        photo_id: photo.photo_id,
        status: photo.status,
        progress,
        error: photo.error_message,
        thumb_url: photo.thumb_url,
        gallery_url: photo.gallery_url,
        pdf_url: photo.pdf_url,
    })))
}

/// GET /api/v1/protocols/{protocol_id}/photos
pub async fn list_photos(
    State(state): State<AppState>,
    Path(protocol_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let photos = PhotoRepo::list_by_protocol(&state.pool, protocol_id).await?;
    Ok(Json(ApiResponse::ok(PhotoListResponse { photos })))
}

/// DELETE /api/v1/protocols/photos/{id}
///
/// Removes the row and best-effort deletes the stored objects. A
/// missing object never blocks the row deletion.
pub async fn delete_photo(
    State(state): State<AppState>,
    Path(photo_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let photo = PhotoRepo::find_by_id(&state.pool, photo_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("photo {photo_id} not found")))?;

    let urls = [
        Some(photo.original_url.clone()),
        photo.thumb_url.clone(),
        photo.gallery_url.clone(),
        photo.pdf_url.clone(),
    ];
    for url in urls.into_iter().flatten() {
        let Some(key) = keys::key_from_url(&url) else {
            continue;
        };
        if let Err(e) = state.store.delete(&key).await {
            tracing::warn!(photo_id, key, error = %e, "object delete failed");
        }
    }

    let deleted = PhotoRepo::delete(&state.pool, photo_id).await?;
    Ok(Json(ApiResponse::ok(DeleteResponse { deleted })))
}
