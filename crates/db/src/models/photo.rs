//! Photo entity models and DTOs.

use fleetdoc_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Photo processing lifecycle, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl PhotoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A row from `photo_derivatives`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PhotoDerivative {
    pub photo_id: DbId,
    pub protocol_id: DbId,
    pub source_legacy_photo_id: Option<DbId>,
    pub original_url: String,
    pub thumb_url: Option<String>,
    pub gallery_url: Option<String>,
    pub pdf_url: Option<String>,
    pub original_hash: Option<String>,
    pub thumb_hash: Option<String>,
    pub gallery_hash: Option<String>,
    pub pdf_hash: Option<String>,
    pub original_size: Option<i64>,
    pub thumb_size: Option<i64>,
    pub gallery_size: Option<i64>,
    pub pdf_size: Option<i64>,
    pub status: String,
    pub processing_progress: i16,
    pub error_message: Option<String>,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
    pub savings: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a freshly uploaded photo.
#[derive(Debug, Clone)]
pub struct CreatePhoto {
    pub protocol_id: DbId,
    pub original_url: String,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
    pub original_size: i64,
}

/// Everything the derivative worker persists on success.
#[derive(Debug, Clone)]
pub struct DerivativeRecord {
    pub thumb_url: String,
    pub gallery_url: String,
    pub pdf_url: String,
    pub original_hash: String,
    pub thumb_hash: String,
    pub gallery_hash: String,
    pub pdf_hash: String,
    pub original_size: i64,
    pub thumb_size: i64,
    pub gallery_size: i64,
    pub pdf_size: i64,
    pub savings: serde_json::Value,
}

/// DTO for a photo row created by migration. Keyed on the legacy photo
/// id so re-running migration upserts instead of duplicating.
#[derive(Debug, Clone)]
pub struct MigratePhoto {
    pub protocol_id: DbId,
    pub source_legacy_photo_id: DbId,
    pub original_url: String,
    pub record: DerivativeRecord,
}
