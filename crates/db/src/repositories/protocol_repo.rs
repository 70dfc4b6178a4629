//! Repository for the `protocols` table.

use fleetdoc_core::types::DbId;
use sqlx::PgPool;

use crate::models::legacy::LegacyProtocol;
use crate::models::protocol::Protocol;

/// Column list for `protocols` queries.
const COLUMNS: &str = "\
    id, legacy_protocol_id, vehicle_id, customer_id, rental_id, \
    protocol_type, data, status, created_at, migrated_at";

pub struct ProtocolRepo;

impl ProtocolRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Protocol>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM protocols WHERE id = $1");
        sqlx::query_as::<_, Protocol>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_legacy_id(
        pool: &PgPool,
        legacy_id: DbId,
    ) -> Result<Option<Protocol>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM protocols WHERE legacy_protocol_id = $1");
        sqlx::query_as::<_, Protocol>(&query)
            .bind(legacy_id)
            .fetch_optional(pool)
            .await
    }

    /// Create the current-model row for a legacy protocol. A re-run
    /// hits the UNIQUE constraint and keeps the existing row untouched.
    pub async fn insert_migrated(
        pool: &PgPool,
        legacy: &LegacyProtocol,
    ) -> Result<Protocol, sqlx::Error> {
        let insert = format!(
            "INSERT INTO protocols \
                 (legacy_protocol_id, vehicle_id, customer_id, rental_id, \
                  protocol_type, data, status, migrated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, 'active', NOW()) \
             ON CONFLICT (legacy_protocol_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Protocol>(&insert)
            .bind(legacy.id)
            .bind(legacy.vehicle_id)
            .bind(legacy.customer_id)
            .bind(legacy.rental_id)
            .bind(&legacy.protocol_type)
            .bind(&legacy.data)
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(protocol) => Ok(protocol),
            // Conflict path: the row already exists from an earlier run.
            None => Self::find_by_legacy_id(pool, legacy.id)
                .await?
                .ok_or(sqlx::Error::RowNotFound),
        }
    }

    /// Remove the migrated row (rollback). Returns `false` when the
    /// legacy protocol was never migrated.
    pub async fn delete_by_legacy_id(pool: &PgPool, legacy_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM protocols WHERE legacy_protocol_id = $1")
            .bind(legacy_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
