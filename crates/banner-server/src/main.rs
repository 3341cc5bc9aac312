//! Main entry point for the Banner feature-flag decision service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tracing::{info, warn};
use uuid::Uuid;

use banner_persistence::service::evaluation;
use banner_persistence::service::flag::{self, TransitionKind};
use banner_persistence::service::project;
use banner_server::config::ServerConfig;
use banner_server::model::AppState;
use banner_server::service::cache::SnapshotCache;
use banner_server::service::change_bus::ChangeBus;
use banner_server::service::evaluation_sink::EvaluationSink;
use banner_server::service::outbox::OutboxDrain;
use banner_server::service::scheduler::{TransitionExecutor, TransitionScheduler};
use banner_server::startup::{self, LoggingConfig};

/// Production transition executor: applies the fired transition through
/// the config store, then drains the outbox so the change propagates.
struct StoreTransitionExecutor {
    db: sea_orm::DatabaseConnection,
    outbox: OutboxDrain,
}

#[async_trait]
impl TransitionExecutor for StoreTransitionExecutor {
    async fn fire(&self, overlay_id: Uuid, kind: TransitionKind) -> anyhow::Result<()> {
        match flag::apply_transition(&self.db, overlay_id, kind).await? {
            Some(outcome) => {
                info!(
                    flag_key = %outcome.flag_key,
                    environment = %outcome.environment_key,
                    enabled = outcome.enabled,
                    "scheduled transition applied"
                );
                self.outbox.drain().await?;
            }
            None => {
                // Cancelled (or already consumed) since scheduling.
                info!(%overlay_id, kind = kind.as_str(), "scheduled transition was a no-op");
            }
        }
        Ok(())
    }
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();

    let logging_config = LoggingConfig::new(config.log_dir.clone(), config.log_level.clone());
    let _logging_guard = startup::init_logging(&logging_config)?;

    info!(address = %config.bind_address, port = config.port, "starting banner-server");

    let db = config.database_connection().await?;

    project::ensure_default(&db).await?;

    let cache = Arc::new(SnapshotCache::new(
        config.snapshot_ttl(),
        config.snapshot_capacity,
    ));
    let bus = ChangeBus::new();
    let outbox = OutboxDrain::new(db.clone(), cache.clone(), bus.clone());

    let scheduler = Arc::new(TransitionScheduler::new(Arc::new(StoreTransitionExecutor {
        db: db.clone(),
        outbox: outbox.clone(),
    })));

    // Re-arm transitions persisted before the last shutdown.
    let pending = flag::pending_transitions(&db).await?;
    let rearmed = pending.len();
    for (overlay_id, kind, at) in pending {
        scheduler.schedule(overlay_id, kind, at);
    }
    if rearmed > 0 {
        info!(count = rearmed, "re-armed scheduled transitions");
    }

    // Sweep outbox rows left behind by a previous crash, then keep
    // sweeping in the background as the TTL-independent safety net.
    if let Err(err) = outbox.drain().await {
        warn!(error = %err, "startup outbox drain failed");
    }
    let _sweeper = outbox
        .clone()
        .start_sweeper(Duration::from_secs(config.outbox_sweep_secs));

    let (sink, _sink_handle) = EvaluationSink::start(db.clone());

    // Daily evaluation-log retention sweep.
    let retention_days = config.evaluation_retention_days;
    let retention_db = db.clone();
    let _retention = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            ticker.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
            match evaluation::prune_before(&retention_db, cutoff).await {
                Ok(pruned) if pruned > 0 => info!(pruned, "evaluation logs pruned"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "evaluation log retention sweep failed"),
            }
        }
    });

    let app_state = Arc::new(AppState {
        db,
        cache,
        bus,
        outbox,
        scheduler: scheduler.clone(),
        sink,
        config: config.clone(),
    });

    let server = startup::http::http_server(app_state, config.bind_address.clone(), config.port)?;

    info!("banner-server listening on {}:{}", config.bind_address, config.port);
    server.await?;

    info!("shutting down");
    scheduler.shutdown();
    Ok(())
}
