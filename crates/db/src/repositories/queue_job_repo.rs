//! Repository for the `queue_jobs` broker table.
//!
//! Claims use `FOR UPDATE SKIP LOCKED`, so any number of worker
//! processes can poll the same lane without double-dispatch.

use fleetdoc_core::types::DbId;
use sqlx::PgPool;

use crate::models::queue_job::{
    EnqueueJob, QueueCounts, QueueJob, STATUS_ACTIVE, STATUS_COMPLETED, STATUS_FAILED,
    STATUS_STALLED, STATUS_WAITING,
};

/// Column list for `queue_jobs` queries.
const COLUMNS: &str = "\
    id, lane, job_type, payload, priority, status, progress, \
    error_message, attempts, run_at, claimed_by, claimed_at, \
    created_at, completed_at";

pub struct QueueJobRepo;

impl QueueJobRepo {
    /// Insert a waiting job, optionally delayed.
    pub async fn enqueue(pool: &PgPool, input: &EnqueueJob<'_>) -> Result<QueueJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO queue_jobs (lane, job_type, payload, priority, run_at) \
             VALUES ($1, $2, $3, $4, NOW() + make_interval(secs => $5::double precision)) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(input.lane)
            .bind(input.job_type)
            .bind(&input.payload)
            .bind(input.priority)
            .bind(input.delay_secs as f64)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next due job in a lane. Priority wins,
    /// then insertion order.
    pub async fn claim_next(
        pool: &PgPool,
        lane: &str,
        claimant: &str,
    ) -> Result<Option<QueueJob>, sqlx::Error> {
        let query = format!(
            "UPDATE queue_jobs \
             SET status = $3, claimed_by = $2, claimed_at = NOW(), attempts = attempts + 1 \
             WHERE id = ( \
                 SELECT id FROM queue_jobs \
                 WHERE lane = $1 AND status = $4 AND run_at <= NOW() \
                 ORDER BY priority DESC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(lane)
            .bind(claimant)
            .bind(STATUS_ACTIVE)
            .bind(STATUS_WAITING)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<QueueJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM queue_jobs WHERE id = $1");
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent job whose payload references the given photo. Status
    /// polls join this onto the photo row for live progress.
    pub async fn latest_for_photo(
        pool: &PgPool,
        photo_id: DbId,
    ) -> Result<Option<QueueJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM queue_jobs \
             WHERE payload ->> 'photo_id' = $1 \
             ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(photo_id.to_string())
            .fetch_optional(pool)
            .await
    }

    /// Most recent job of a type whose payload references the given
    /// protocol. Document status polls use this to detect in-flight work.
    pub async fn latest_for_protocol(
        pool: &PgPool,
        protocol_id: DbId,
        job_type: &str,
    ) -> Result<Option<QueueJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM queue_jobs \
             WHERE payload ->> 'protocol_id' = $1 AND job_type = $2 \
             ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, QueueJob>(&query)
            .bind(protocol_id.to_string())
            .bind(job_type)
            .fetch_optional(pool)
            .await
    }

    /// Persist a 0-100 progress checkpoint.
    pub async fn update_progress(
        pool: &PgPool,
        id: DbId,
        progress: i16,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE queue_jobs SET progress = $2 WHERE id = $1")
            .bind(id)
            .bind(progress)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn complete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET status = $2, progress = 100, completed_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(STATUS_COMPLETED)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Terminal failure with verbatim error text. No automatic retry.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE queue_jobs \
             SET status = $2, error_message = $3, completed_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(STATUS_FAILED)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Per-lane state counts.
    pub async fn counts(pool: &PgPool, lane: &str) -> Result<QueueCounts, sqlx::Error> {
        sqlx::query_as::<_, QueueCounts>(
            "SELECT \
                 COUNT(*) FILTER (WHERE status = 'waiting')   AS waiting, \
                 COUNT(*) FILTER (WHERE status = 'active')    AS active, \
                 COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
                 COUNT(*) FILTER (WHERE status = 'failed')    AS failed, \
                 COUNT(*) FILTER (WHERE status = 'stalled')   AS stalled \
             FROM queue_jobs WHERE lane = $1",
        )
        .bind(lane)
        .fetch_one(pool)
        .await
    }

    /// Flag active jobs whose claim is older than the threshold.
    /// Stalled jobs are surfaced for operators, never auto-retried.
    pub async fn sweep_stalled(pool: &PgPool, older_than_secs: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE queue_jobs SET status = $1 \
             WHERE status = $2 \
               AND claimed_at < NOW() - make_interval(secs => $3::double precision)",
        )
        .bind(STATUS_STALLED)
        .bind(STATUS_ACTIVE)
        .bind(older_than_secs as f64)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
