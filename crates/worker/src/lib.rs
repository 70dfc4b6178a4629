//! Queue worker: claims jobs from the durable broker and drives the
//! processing services.

pub mod config;
pub mod dispatcher;
pub mod sweeper;

pub use config::WorkerConfig;
pub use dispatcher::Dispatcher;
