mod feature_flag_repo;
mod legacy_repo;
mod photo_repo;
mod processing_job_repo;
mod protocol_repo;
mod queue_job_repo;

pub use feature_flag_repo::FeatureFlagRepo;
pub use legacy_repo::LegacyProtocolRepo;
pub use photo_repo::PhotoRepo;
pub use processing_job_repo::ProcessingJobRepo;
pub use protocol_repo::ProtocolRepo;
pub use queue_job_repo::QueueJobRepo;
