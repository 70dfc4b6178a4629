//! Stalled-job sweeper.
//!
//! A job whose worker died stays `active` forever from the broker's
//! point of view. The sweeper flips such jobs to `stalled` once their
//! claim outlives the timeout. Stalled jobs are terminal; requeueing
//! is an operator decision, never automatic.

use fleetdoc_db::repositories::QueueJobRepo;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

pub fn spawn(
    pool: PgPool,
    stall_timeout_secs: i64,
    sweep_interval_secs: u64,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(sweep_interval_secs));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match QueueJobRepo::sweep_stalled(&pool, stall_timeout_secs).await {
                Ok(0) => {}
                Ok(swept) => tracing::warn!(swept, "stalled jobs detected"),
                Err(e) => tracing::error!(error = %e, "stall sweep failed"),
            }
        }
        tracing::info!("sweeper stopped");
    })
}
