//! Feature-flag gating.
//!
//! Mutating routes are guarded by a flag in the `feature_flags` table.
//! Gated handlers call [`require_feature`] before doing any work; a
//! disabled or unknown flag answers 403 with code `FEATURE_DISABLED`.
//! Read-only routes stay open regardless of flag state.

use fleetdoc_db::repositories::FeatureFlagRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Reject the request unless the flag is enabled.
pub async fn require_feature(state: &AppState, flag: &'static str) -> AppResult<()> {
    if !FeatureFlagRepo::is_enabled(&state.pool, flag).await? {
        tracing::warn!(flag, "gated request rejected");
        return Err(AppError::FeatureDisabled(flag.to_string()));
    }
    Ok(())
}
