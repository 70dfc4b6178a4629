use fleetdoc_core::error::CoreError;
use fleetdoc_core::types::DbId;
use fleetdoc_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("photo {0} not found")]
    PhotoNotFound(DbId),

    #[error("protocol {0} not found")]
    ProtocolNotFound(DbId),

    #[error("no photos to include in manifest")]
    NoPhotos,

    #[error("download failed for {url}: {message}")]
    Download { url: String, message: String },

    #[error("invalid job payload: {0}")]
    Payload(String),
}
