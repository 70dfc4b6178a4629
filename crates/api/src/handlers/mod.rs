pub mod migration;
pub mod photos;
pub mod protocols;
pub mod queue;
