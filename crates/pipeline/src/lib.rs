//! Processing pipeline: the workers behind every queue lane, plus the
//! V1-to-V2 migration service. Everything here is storage- and
//! database-backed but transport-agnostic; the HTTP layer only
//! enqueues and polls.

pub mod derivative;
pub mod error;
pub mod jobs;
pub mod manifest;
pub mod migration;
pub mod pdf_build;

pub use error::PipelineError;
