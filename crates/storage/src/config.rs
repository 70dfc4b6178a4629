//! Storage configuration from the environment.

use std::path::PathBuf;
use std::sync::Arc;

use crate::{LocalStore, ObjectStore, S3Store, StorageError};

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// CDN or custom-domain base for public URLs.
    pub public_base_url: Option<String>,
    /// Root directory of the local fallback backend.
    pub local_root: PathBuf,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            bucket: std::env::var("R2_BUCKET_NAME").unwrap_or_else(|_| "fleetdoc".into()),
            // R2 expects the literal region "auto".
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".into()),
            endpoint: std::env::var("R2_ENDPOINT").ok(),
            access_key_id: std::env::var("R2_ACCESS_KEY_ID").ok(),
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY").ok(),
            public_base_url: std::env::var("R2_PUBLIC_URL").ok(),
            local_root: std::env::var("STORAGE_LOCAL_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./local-storage")),
        }
    }

    /// True when enough is present to talk to a real bucket.
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
            && self.access_key_id.is_some()
            && self.secret_access_key.is_some()
            && !self.bucket.is_empty()
    }
}

/// Pick the backend: S3/R2 when configured, local disk otherwise.
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    if config.is_configured() {
        let store = S3Store::connect(config).await?;
        tracing::info!(bucket = %config.bucket, "using object storage backend");
        Ok(Arc::new(store))
    } else {
        tracing::warn!(
            root = %config.local_root.display(),
            "object storage not configured, falling back to local disk"
        );
        Ok(Arc::new(LocalStore::new(config.local_root.clone())))
    }
}
