//! Shared application state

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::warn;

use crate::config::ServerConfig;
use crate::service::cache::SnapshotCache;
use crate::service::change_bus::ChangeBus;
use crate::service::evaluation_sink::EvaluationSink;
use crate::service::outbox::OutboxDrain;
use crate::service::scheduler::TransitionScheduler;

/// Everything the handlers need, shared behind `web::Data`.
pub struct AppState {
    pub config: ServerConfig,
    pub db: DatabaseConnection,
    pub cache: Arc<SnapshotCache>,
    pub bus: ChangeBus,
    pub outbox: OutboxDrain,
    pub scheduler: Arc<TransitionScheduler>,
    pub sink: EvaluationSink,
}

impl AppState {
    /// Apply pending invalidations and bus events after an admin write.
    ///
    /// A failed drain is logged, not surfaced: the write itself committed,
    /// and the sweeper (or the snapshot TTL) will catch up.
    pub async fn drain_outbox(&self) {
        if let Err(err) = self.outbox.drain().await {
            warn!(error = %err, "inline outbox drain failed");
        }
    }
}
