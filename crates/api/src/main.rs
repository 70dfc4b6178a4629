use std::net::SocketAddr;
use std::sync::Arc;

use fleetdoc_core::imaging::DerivativeProfile;
use fleetdoc_pipeline::migration::MigrationService;
use fleetdoc_storage::StorageConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fleetdoc_api::config::ServerConfig;
use fleetdoc_api::router::build_app_router;
use fleetdoc_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetdoc_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = fleetdoc_db::create_pool(&database_url, 10)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    fleetdoc_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Object storage ---
    let store = fleetdoc_storage::build_store(&StorageConfig::from_env())
        .await
        .expect("Failed to set up object storage");

    // --- Services ---
    let profile = DerivativeProfile::default();
    let migration = Arc::new(MigrationService::new(
        pool.clone(),
        store.clone(),
        profile.clone(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        store,
        profile,
        migration,
    };

    // --- Server ---
    let app = build_app_router(state, &config);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
        .expect("Server error");
}
