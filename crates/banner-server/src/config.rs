//! Server configuration
//!
//! Loaded from command-line arguments with environment-variable fallbacks.

use std::time::Duration;

use clap::Parser;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Banner feature-flag decision service
#[derive(Clone, Debug, Parser)]
#[command(name = "banner-server")]
pub struct ServerConfig {
    /// Relational store connection string
    #[arg(long = "db-url", env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "BANNER_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    #[arg(long, env = "BANNER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Soft TTL of cached snapshots in seconds. The cache is authoritative
    /// within the TTL; it is also the cross-process staleness bound when an
    /// invalidation is lost.
    #[arg(long, env = "BANNER_SNAPSHOT_TTL_SECS", default_value_t = 60)]
    pub snapshot_ttl_secs: u64,

    #[arg(long, env = "BANNER_SNAPSHOT_CAPACITY", default_value_t = 100_000)]
    pub snapshot_capacity: u64,

    /// Interval of the background outbox sweeper in seconds
    #[arg(long, env = "BANNER_OUTBOX_SWEEP_SECS", default_value_t = 5)]
    pub outbox_sweep_secs: u64,

    /// Evaluation-log retention window in days
    #[arg(long, env = "BANNER_EVALUATION_RETENTION_DAYS", default_value_t = 30)]
    pub evaluation_retention_days: i64,

    /// Directory for rolling log files; file logging is disabled when unset
    #[arg(long, env = "BANNER_LOG_DIR")]
    pub log_dir: Option<String>,

    /// Log level for console and file output
    #[arg(long, env = "BANNER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "BANNER_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub db_max_connections: u32,
}

impl ServerConfig {
    pub async fn database_connection(&self) -> Result<DatabaseConnection, DbErr> {
        let mut opt = ConnectOptions::new(&self.database_url);
        opt.max_connections(self.db_max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .sqlx_logging(false);

        Database::connect(opt).await
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }
}
