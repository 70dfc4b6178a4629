use std::sync::Arc;

use fleetdoc_core::imaging::DerivativeProfile;
use fleetdoc_pipeline::derivative::DerivativeService;
use fleetdoc_pipeline::manifest::ManifestService;
use fleetdoc_pipeline::pdf_build::PdfBuildService;
use fleetdoc_storage::StorageConfig;
use fleetdoc_worker::dispatcher::{Dispatcher, Services};
use fleetdoc_worker::{sweeper, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetdoc_worker=debug,fleetdoc_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let pool = match fleetdoc_db::create_pool(&config.database_url, config.db_max_connections).await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "database connection failed");
            std::process::exit(1);
        }
    };

    let store = match fleetdoc_storage::build_store(&StorageConfig::from_env()).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "object storage setup failed");
            std::process::exit(1);
        }
    };

    let profile = DerivativeProfile::default();
    let services = Arc::new(Services {
        derivative: DerivativeService::new(pool.clone(), store.clone(), profile),
        pdf_build: PdfBuildService::new(pool.clone(), store.clone()),
        manifest: ManifestService::new(pool.clone(), store.clone()),
    });

    let dispatcher = Arc::new(Dispatcher::new(
        pool.clone(),
        services,
        config.poll_interval_secs,
    ));
    tracing::info!(worker_id = dispatcher.worker_id(), "worker starting");

    let cancel = CancellationToken::new();
    let mut handles = dispatcher.spawn_lanes(&cancel);
    handles.push(sweeper::spawn(
        pool,
        config.stall_timeout_secs,
        config.sweep_interval_secs,
        cancel.clone(),
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "signal handler failed");
    }
    tracing::info!("shutdown requested");
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }
    tracing::info!("worker stopped");
}
