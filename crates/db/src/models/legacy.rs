//! Legacy (V1) rows consumed by migration. Read-mostly; the only
//! writes are the `migrated` flag transitions.

use fleetdoc_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from `legacy_protocols`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LegacyProtocol {
    pub id: DbId,
    pub vehicle_id: Option<DbId>,
    pub customer_id: Option<DbId>,
    pub rental_id: Option<DbId>,
    pub protocol_type: String,
    pub data: serde_json::Value,
    pub pdf_url: Option<String>,
    pub created_at: Timestamp,
    pub migrated: bool,
    pub migrated_at: Option<Timestamp>,
}

/// A row from `legacy_protocol_photos`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LegacyPhoto {
    pub id: DbId,
    pub protocol_id: DbId,
    pub photo_url: String,
    pub description: String,
    pub category: String,
}

/// Candidate selection for a migration run: explicit ids win, then a
/// date range, otherwise every unmigrated row.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub protocol_ids: Option<Vec<DbId>>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}
