use std::sync::Arc;

use fleetdoc_core::imaging::DerivativeProfile;
use fleetdoc_pipeline::migration::MigrationService;
use fleetdoc_storage::ObjectStore;
use sqlx::PgPool;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: PgPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Object storage gateway (S3-compatible or local fallback).
    pub store: Arc<dyn ObjectStore>,
    /// Derivative rendition profile, shared with workers.
    pub profile: DerivativeProfile,
    /// Legacy migration service (holds the in-flight run's progress).
    pub migration: Arc<MigrationService>,
}
