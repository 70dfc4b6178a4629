//! Durable broker rows.

use fleetdoc_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

pub const LANE_PHOTO: &str = "photo";
pub const LANE_DOCUMENT: &str = "document";

pub const STATUS_WAITING: &str = "waiting";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";
pub const STATUS_STALLED: &str = "stalled";

/// A row from `queue_jobs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueJob {
    pub id: DbId,
    pub lane: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub status: String,
    pub progress: i16,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub run_at: Timestamp,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// DTO for enqueuing a job.
#[derive(Debug, Clone)]
pub struct EnqueueJob<'a> {
    pub lane: &'a str,
    pub job_type: &'a str,
    pub payload: serde_json::Value,
    pub priority: i32,
    /// Delay before the job becomes claimable.
    pub delay_secs: i64,
}

/// Per-lane state counts for the stats endpoint.
#[derive(Debug, Clone, Copy, Default, FromRow, Serialize)]
pub struct QueueCounts {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub stalled: i64,
}
