//! Object storage gateway.
//!
//! All pipeline artifacts (originals, derivatives, PDFs, manifests) go
//! through the [`ObjectStore`] trait. Production uses the S3-compatible
//! backend against R2; when storage credentials are absent the local
//! disk backend takes over, so development and tests never need a
//! bucket.

use async_trait::async_trait;
use thiserror::Error;

pub mod config;
pub mod keys;
pub mod local;
pub mod s3;

pub use config::{build_store, StorageConfig};
pub use local::LocalStore;
pub use s3::S3Store;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("storage backend error: {message}")]
    Backend { message: String, retryable: bool },

    #[error("storage io error at {path}: {message}")]
    Io { path: String, message: String },
}

/// Backend-agnostic object operations over a single configured bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, returning the object's public URL.
    /// Re-putting the same key overwrites; keys are unique per
    /// protocol/photo/rendition, so re-runs are idempotent.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;

    /// Fetch the full object. Missing keys are [`StorageError::NotFound`].
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Delete one object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// All keys under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    fn public_url(&self, key: &str) -> String;

    /// Delete everything under `prefix`, returning how many objects
    /// went away. Used when a protocol or photo is removed wholesale.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let keys = self.list(prefix).await?;
        let count = keys.len();
        for key in keys {
            self.delete(&key).await?;
        }
        Ok(count)
    }
}
