//! Feature flag rows gating pipeline surfaces.

use fleetdoc_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

pub const FLAG_PHOTO_UPLOAD: &str = "protocol_photo_upload";
pub const FLAG_PDF_GENERATION: &str = "protocol_pdf_generation";
pub const FLAG_MANIFEST_GENERATION: &str = "protocol_manifest_generation";
pub const FLAG_MIGRATION: &str = "protocol_migration";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeatureFlag {
    pub flag_name: String,
    pub enabled: bool,
    pub updated_at: Timestamp,
}
