//! Outbox queue
//!
//! Writes enqueue the invalidations and change-bus events they imply as
//! rows inside the same transaction; the server drains rows after commit
//! and a background sweeper collects anything left behind by a crash.
//! Rows are drained in insertion order, which is what gives the change bus
//! its per-project FIFO ordering.

use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::outbox_event;

/// One pending invalidation + change-bus event.
#[derive(Clone, Debug)]
pub struct PendingEvent {
    pub project_id: Uuid,
    pub action: String,
    pub flag_key: String,
    pub environment_key: String,
    pub enabled: Option<bool>,
}

impl PendingEvent {
    pub fn new(
        project_id: Uuid,
        action: &str,
        flag_key: &str,
        environment_key: &str,
        enabled: Option<bool>,
    ) -> Self {
        Self {
            project_id,
            action: action.to_string(),
            flag_key: flag_key.to_string(),
            environment_key: environment_key.to_string(),
            enabled,
        }
    }
}

/// Enqueue events inside the caller's transaction.
pub async fn enqueue<C: ConnectionTrait>(
    conn: &C,
    events: Vec<PendingEvent>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let rows = events
        .into_iter()
        .map(|event| outbox_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(event.project_id),
            action: Set(event.action),
            flag_key: Set(event.flag_key),
            environment_key: Set(event.environment_key),
            enabled: Set(event.enabled),
            created_at: Set(now),
        })
        .collect::<Vec<_>>();

    outbox_event::Entity::insert_many(rows)
        .on_empty_do_nothing()
        .exec(conn)
        .await?;
    Ok(())
}

/// Fetch the oldest pending events, oldest first.
pub async fn fetch_batch(
    db: &DatabaseConnection,
    limit: u64,
) -> anyhow::Result<Vec<outbox_event::Model>> {
    let rows = outbox_event::Entity::find()
        .order_by_asc(outbox_event::Column::CreatedAt)
        .order_by_asc(outbox_event::Column::Id)
        .limit(limit)
        .all(db)
        .await?;
    Ok(rows)
}

/// Delete drained events.
pub async fn delete(db: &DatabaseConnection, ids: &[Uuid]) -> anyhow::Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    outbox_event::Entity::delete_many()
        .filter(outbox_event::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(())
}
