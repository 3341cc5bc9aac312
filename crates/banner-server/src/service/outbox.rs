//! Outbox drain
//!
//! Applies committed outbox rows: drop the affected cache snapshots, then
//! publish the change-bus event, then delete the row. Admin handlers drain
//! inline right after their write commits, which is what makes a write
//! visible to the next same-process decision; the background sweeper only
//! exists to pick up rows a crashed or racing process left behind.
//! Duplicate delivery is possible and allowed — subscribers tolerate it.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use banner_persistence::service::outbox;

use super::cache::SnapshotCache;
use super::change_bus::{ChangeBus, ChangeEvent};

const DRAIN_BATCH: u64 = 256;

#[derive(Clone)]
pub struct OutboxDrain {
    db: DatabaseConnection,
    cache: Arc<SnapshotCache>,
    bus: ChangeBus,
}

impl OutboxDrain {
    pub fn new(db: DatabaseConnection, cache: Arc<SnapshotCache>, bus: ChangeBus) -> Self {
        Self { db, cache, bus }
    }

    /// Drain every pending row, oldest first. Returns the number of rows
    /// applied.
    pub async fn drain(&self) -> anyhow::Result<usize> {
        let mut applied = 0;

        loop {
            let batch = outbox::fetch_batch(&self.db, DRAIN_BATCH).await?;
            if batch.is_empty() {
                return Ok(applied);
            }

            let ids: Vec<_> = batch.iter().map(|row| row.id).collect();

            for row in &batch {
                // Invalidate before publishing: a subscriber reacting to the
                // event must not be able to re-read the stale snapshot.
                self.cache
                    .invalidate(row.project_id, &row.flag_key, &row.environment_key);
                self.bus.publish(ChangeEvent {
                    project_id: row.project_id,
                    action: row.action.clone(),
                    flag_key: row.flag_key.clone(),
                    environment: row.environment_key.clone(),
                    enabled: row.enabled,
                    timestamp: row.created_at,
                });
            }

            outbox::delete(&self.db, &ids).await?;
            applied += batch.len();
            debug!(count = batch.len(), "outbox batch drained");
        }
    }

    /// Periodic sweep for rows left behind by a crash or another process.
    pub fn start_sweeper(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.drain().await {
                    warn!(error = %err, "outbox sweep failed");
                }
            }
        })
    }
}
