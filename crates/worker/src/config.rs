//! Worker process configuration, read from the environment.

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Idle sleep between claim attempts when a lane is empty.
    pub poll_interval_secs: u64,
    /// Active jobs older than this are swept to `stalled`.
    pub stall_timeout_secs: i64,
    /// Sweep cadence.
    pub sweep_interval_secs: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/fleetdoc".into()),
            db_max_connections: env_parse("WORKER_DB_MAX_CONNECTIONS", 5),
            poll_interval_secs: env_parse("WORKER_POLL_INTERVAL_SECS", 1),
            stall_timeout_secs: env_parse("WORKER_STALL_TIMEOUT_SECS", 300),
            sweep_interval_secs: env_parse("WORKER_SWEEP_INTERVAL_SECS", 60),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
