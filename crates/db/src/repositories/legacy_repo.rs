//! Repository for the legacy (V1) tables consumed by migration.

use fleetdoc_core::types::DbId;
use sqlx::PgPool;

use crate::models::legacy::{CandidateFilter, LegacyPhoto, LegacyProtocol};

/// Column list for `legacy_protocols` queries.
const COLUMNS: &str = "\
    id, vehicle_id, customer_id, rental_id, protocol_type, data, \
    pdf_url, created_at, migrated, migrated_at";

pub struct LegacyProtocolRepo;

impl LegacyProtocolRepo {
    /// Select migration candidates. Explicit ids override everything
    /// (including the migrated flag, so re-runs can be forced); a date
    /// range narrows the unmigrated set; no filter means all
    /// unmigrated rows.
    pub async fn candidates(
        pool: &PgPool,
        filter: &CandidateFilter,
    ) -> Result<Vec<LegacyProtocol>, sqlx::Error> {
        if let Some(ids) = &filter.protocol_ids {
            let query = format!(
                "SELECT {COLUMNS} FROM legacy_protocols \
                 WHERE id = ANY($1) ORDER BY id ASC"
            );
            return sqlx::query_as::<_, LegacyProtocol>(&query)
                .bind(ids)
                .fetch_all(pool)
                .await;
        }

        let query = format!(
            "SELECT {COLUMNS} FROM legacy_protocols \
             WHERE migrated = FALSE \
               AND ($1::timestamptz IS NULL OR created_at >= $1) \
               AND ($2::timestamptz IS NULL OR created_at <= $2) \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, LegacyProtocol>(&query)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<LegacyProtocol>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM legacy_protocols WHERE id = $1");
        sqlx::query_as::<_, LegacyProtocol>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn photos_for(
        pool: &PgPool,
        protocol_id: DbId,
    ) -> Result<Vec<LegacyPhoto>, sqlx::Error> {
        sqlx::query_as::<_, LegacyPhoto>(
            "SELECT id, protocol_id, photo_url, description, category \
             FROM legacy_protocol_photos WHERE protocol_id = $1 ORDER BY id ASC",
        )
        .bind(protocol_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_photos(pool: &PgPool, protocol_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM legacy_protocol_photos WHERE protocol_id = $1")
            .bind(protocol_id)
            .fetch_one(pool)
            .await
    }

    pub async fn mark_migrated(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE legacy_protocols SET migrated = TRUE, migrated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Clear the flag during rollback. Safe on never-migrated rows.
    pub async fn unmark_migrated(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE legacy_protocols SET migrated = FALSE, migrated_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
