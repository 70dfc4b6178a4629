//! Current-model protocol rows.

use fleetdoc_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from `protocols`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Protocol {
    pub id: DbId,
    pub legacy_protocol_id: Option<DbId>,
    pub vehicle_id: Option<DbId>,
    pub customer_id: Option<DbId>,
    pub rental_id: Option<DbId>,
    pub protocol_type: String,
    pub data: serde_json::Value,
    pub status: String,
    pub created_at: Timestamp,
    pub migrated_at: Option<Timestamp>,
}
