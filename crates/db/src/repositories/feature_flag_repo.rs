//! Repository for the `feature_flags` table.

use sqlx::PgPool;

use crate::models::feature_flag::FeatureFlag;

pub struct FeatureFlagRepo;

impl FeatureFlagRepo {
    /// Unknown flags read as disabled.
    pub async fn is_enabled(pool: &PgPool, flag_name: &str) -> Result<bool, sqlx::Error> {
        let enabled: Option<bool> =
            sqlx::query_scalar("SELECT enabled FROM feature_flags WHERE flag_name = $1")
                .bind(flag_name)
                .fetch_optional(pool)
                .await?;
        Ok(enabled.unwrap_or(false))
    }

    pub async fn set_enabled(
        pool: &PgPool,
        flag_name: &str,
        enabled: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO feature_flags (flag_name, enabled) VALUES ($1, $2) \
             ON CONFLICT (flag_name) DO UPDATE \
             SET enabled = EXCLUDED.enabled, updated_at = NOW()",
        )
        .bind(flag_name)
        .bind(enabled)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<FeatureFlag>, sqlx::Error> {
        sqlx::query_as::<_, FeatureFlag>(
            "SELECT flag_name, enabled, updated_at FROM feature_flags ORDER BY flag_name",
        )
        .fetch_all(pool)
        .await
    }
}
