//! Repository for the `protocol_processing_jobs` history table.

use fleetdoc_core::types::DbId;
use sqlx::PgPool;

use crate::models::processing_job::{ProcessingJob, RecordProcessingJob};

/// Column list for `protocol_processing_jobs` queries.
const COLUMNS: &str = "\
    id, protocol_id, job_type, status, result_url, error_message, \
    metadata, created_at, completed_at";

pub struct ProcessingJobRepo;

impl ProcessingJobRepo {
    /// Append an outcome row. Terminal statuses get `completed_at`.
    pub async fn record(
        pool: &PgPool,
        input: &RecordProcessingJob<'_>,
    ) -> Result<ProcessingJob, sqlx::Error> {
        let query = format!(
            "INSERT INTO protocol_processing_jobs \
                 (protocol_id, job_type, status, result_url, error_message, metadata, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, \
                     CASE WHEN $3 IN ('completed', 'failed') THEN NOW() END) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(input.protocol_id)
            .bind(input.job_type)
            .bind(input.status)
            .bind(input.result_url)
            .bind(input.error_message)
            .bind(&input.metadata)
            .fetch_one(pool)
            .await
    }

    /// Latest row wins: the newest entry of a type is the protocol's
    /// current status for that artifact.
    pub async fn latest(
        pool: &PgPool,
        protocol_id: DbId,
        job_type: &str,
    ) -> Result<Option<ProcessingJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM protocol_processing_jobs \
             WHERE protocol_id = $1 AND job_type = $2 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, ProcessingJob>(&query)
            .bind(protocol_id)
            .bind(job_type)
            .fetch_optional(pool)
            .await
    }

    /// Remove a protocol's history (migration rollback).
    pub async fn delete_by_protocol(pool: &PgPool, protocol_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM protocol_processing_jobs WHERE protocol_id = $1")
            .bind(protocol_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
