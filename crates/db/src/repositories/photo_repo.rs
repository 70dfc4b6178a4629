//! Repository for the `photo_derivatives` and `photo_metadata` tables.

use fleetdoc_core::types::DbId;
use sqlx::PgPool;

use crate::models::photo::{
    CreatePhoto, DerivativeRecord, MigratePhoto, PhotoDerivative, PhotoStatus,
};

/// Column list for `photo_derivatives` queries.
const COLUMNS: &str = "\
    photo_id, protocol_id, source_legacy_photo_id, original_url, \
    thumb_url, gallery_url, pdf_url, \
    original_hash, thumb_hash, gallery_hash, pdf_hash, \
    original_size, thumb_size, gallery_size, pdf_size, \
    status, processing_progress, error_message, \
    original_filename, mime_type, savings, created_at, updated_at";

pub struct PhotoRepo;

impl PhotoRepo {
    /// Insert a freshly uploaded photo in `uploaded` state.
    pub async fn create(pool: &PgPool, input: &CreatePhoto) -> Result<PhotoDerivative, sqlx::Error> {
        let query = format!(
            "INSERT INTO photo_derivatives \
                 (protocol_id, original_url, original_filename, mime_type, original_size) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoDerivative>(&query)
            .bind(input.protocol_id)
            .bind(&input.original_url)
            .bind(&input.original_filename)
            .bind(&input.mime_type)
            .bind(input.original_size)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        photo_id: DbId,
    ) -> Result<Option<PhotoDerivative>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM photo_derivatives WHERE photo_id = $1");
        sqlx::query_as::<_, PhotoDerivative>(&query)
            .bind(photo_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_protocol(
        pool: &PgPool,
        protocol_id: DbId,
    ) -> Result<Vec<PhotoDerivative>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM photo_derivatives \
             WHERE protocol_id = $1 ORDER BY photo_id ASC"
        );
        sqlx::query_as::<_, PhotoDerivative>(&query)
            .bind(protocol_id)
            .fetch_all(pool)
            .await
    }

    /// Point the row at its stored original. The upload flow inserts
    /// first to obtain the id the storage key is derived from.
    pub async fn set_original_url(
        pool: &PgPool,
        photo_id: DbId,
        original_url: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE photo_derivatives \
             SET original_url = $2, updated_at = NOW() WHERE photo_id = $1",
        )
        .bind(photo_id)
        .bind(original_url)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_processing(pool: &PgPool, photo_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE photo_derivatives \
             SET status = $2, updated_at = NOW() WHERE photo_id = $1",
        )
        .bind(photo_id)
        .bind(PhotoStatus::Processing.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist a progress checkpoint so status polls see it.
    pub async fn update_progress(
        pool: &PgPool,
        photo_id: DbId,
        progress: i16,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE photo_derivatives \
             SET processing_progress = $2, updated_at = NOW() WHERE photo_id = $1",
        )
        .bind(photo_id)
        .bind(progress)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Persist all derivative artifacts and mark the photo completed.
    pub async fn complete(
        pool: &PgPool,
        photo_id: DbId,
        record: &DerivativeRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE photo_derivatives SET \
                 thumb_url = $2, gallery_url = $3, pdf_url = $4, \
                 original_hash = $5, thumb_hash = $6, gallery_hash = $7, pdf_hash = $8, \
                 original_size = $9, thumb_size = $10, gallery_size = $11, pdf_size = $12, \
                 savings = $13, status = $14, processing_progress = 100, \
                 error_message = NULL, updated_at = NOW() \
             WHERE photo_id = $1",
        )
        .bind(photo_id)
        .bind(&record.thumb_url)
        .bind(&record.gallery_url)
        .bind(&record.pdf_url)
        .bind(&record.original_hash)
        .bind(&record.thumb_hash)
        .bind(&record.gallery_hash)
        .bind(&record.pdf_hash)
        .bind(record.original_size)
        .bind(record.thumb_size)
        .bind(record.gallery_size)
        .bind(record.pdf_size)
        .bind(&record.savings)
        .bind(PhotoStatus::Completed.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failure with the verbatim error text.
    pub async fn mark_failed(
        pool: &PgPool,
        photo_id: DbId,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE photo_derivatives \
             SET status = $2, error_message = $3, updated_at = NOW() \
             WHERE photo_id = $1",
        )
        .bind(photo_id)
        .bind(PhotoStatus::Failed.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Upsert a photo produced by migration, keyed on the legacy photo
    /// id so re-runs replace instead of duplicating.
    pub async fn upsert_migrated(
        pool: &PgPool,
        input: &MigratePhoto,
    ) -> Result<PhotoDerivative, sqlx::Error> {
        let r = &input.record;
        let query = format!(
            "INSERT INTO photo_derivatives \
                 (protocol_id, source_legacy_photo_id, original_url, \
                  thumb_url, gallery_url, pdf_url, \
                  original_hash, thumb_hash, gallery_hash, pdf_hash, \
                  original_size, thumb_size, gallery_size, pdf_size, \
                  savings, status, processing_progress) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 100) \
             ON CONFLICT (source_legacy_photo_id) DO UPDATE SET \
                 thumb_url = EXCLUDED.thumb_url, \
                 gallery_url = EXCLUDED.gallery_url, \
                 pdf_url = EXCLUDED.pdf_url, \
                 original_hash = EXCLUDED.original_hash, \
                 thumb_hash = EXCLUDED.thumb_hash, \
                 gallery_hash = EXCLUDED.gallery_hash, \
                 pdf_hash = EXCLUDED.pdf_hash, \
                 original_size = EXCLUDED.original_size, \
                 thumb_size = EXCLUDED.thumb_size, \
                 gallery_size = EXCLUDED.gallery_size, \
                 pdf_size = EXCLUDED.pdf_size, \
                 savings = EXCLUDED.savings, \
                 status = EXCLUDED.status, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PhotoDerivative>(&query)
            .bind(input.protocol_id)
            .bind(input.source_legacy_photo_id)
            .bind(&input.original_url)
            .bind(&r.thumb_url)
            .bind(&r.gallery_url)
            .bind(&r.pdf_url)
            .bind(&r.original_hash)
            .bind(&r.thumb_hash)
            .bind(&r.gallery_hash)
            .bind(&r.pdf_hash)
            .bind(r.original_size)
            .bind(r.thumb_size)
            .bind(r.gallery_size)
            .bind(r.pdf_size)
            .bind(&r.savings)
            .bind(PhotoStatus::Completed.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, photo_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM photo_derivatives WHERE photo_id = $1")
            .bind(photo_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every photo of a protocol (migration rollback).
    pub async fn delete_by_protocol(pool: &PgPool, protocol_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM photo_derivatives WHERE protocol_id = $1")
            .bind(protocol_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_by_protocol(pool: &PgPool, protocol_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM photo_derivatives WHERE protocol_id = $1")
            .bind(protocol_id)
            .fetch_one(pool)
            .await
    }

    /// Capture upload-time metadata alongside the photo row.
    pub async fn save_metadata(
        pool: &PgPool,
        photo_id: DbId,
        protocol_id: DbId,
        metadata: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO photo_metadata (photo_id, protocol_id, metadata) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (photo_id) DO UPDATE SET metadata = EXCLUDED.metadata",
        )
        .bind(photo_id)
        .bind(protocol_id)
        .bind(metadata)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_metadata(
        pool: &PgPool,
        photo_id: DbId,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        sqlx::query_scalar("SELECT metadata FROM photo_metadata WHERE photo_id = $1")
            .bind(photo_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn mark_metadata_processed(pool: &PgPool, photo_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE photo_metadata SET processed_at = NOW() WHERE photo_id = $1")
            .bind(photo_id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
