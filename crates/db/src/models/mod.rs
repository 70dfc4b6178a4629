pub mod feature_flag;
pub mod legacy;
pub mod photo;
pub mod processing_job;
pub mod protocol;
pub mod queue_job;
