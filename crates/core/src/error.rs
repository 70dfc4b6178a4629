use crate::types::DbId;

/// Domain-level error type shared by all fleetdoc crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// A digest could not be computed. Hashing must fail loudly: a
    /// silent zero-hash would poison dedup and integrity checks
    /// downstream.
    #[error("Hashing failed: {0}")]
    Hashing(String),

    #[error("Image processing failed: {0}")]
    Imaging(String),

    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
