//! Per-protocol processing history rows.

use fleetdoc_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

pub const JOB_TYPE_PDF: &str = "pdf_generation";
pub const JOB_TYPE_MANIFEST: &str = "manifest_generation";
pub const JOB_TYPE_PDF_MIGRATION: &str = "pdf_migration";

/// A row from `protocol_processing_jobs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProcessingJob {
    pub id: DbId,
    pub protocol_id: DbId,
    pub job_type: String,
    pub status: String,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// DTO for recording a processing outcome.
#[derive(Debug, Clone)]
pub struct RecordProcessingJob<'a> {
    pub protocol_id: DbId,
    pub job_type: &'a str,
    /// `processing`, `completed` or `failed`.
    pub status: &'a str,
    pub result_url: Option<&'a str>,
    pub error_message: Option<&'a str>,
    pub metadata: Option<serde_json::Value>,
}
