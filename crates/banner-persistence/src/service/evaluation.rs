//! Evaluation log writes
//!
//! Batched inserts fed by the server's fire-and-forget sink. Nothing here
//! is allowed to surface on the decision path.

use chrono::{DateTime, Utc};
use sea_orm::*;
use uuid::Uuid;

use crate::entity::evaluation_log;

/// One decision to record.
#[derive(Clone, Debug)]
pub struct EvaluationRecord {
    pub project_id: Uuid,
    pub flag_key: String,
    pub environment_key: String,
    pub subject_id: Option<String>,
    pub context: serde_json::Value,
    pub enabled: bool,
    pub variant_key: Option<String>,
    pub matched_rule_id: Option<Uuid>,
    pub reason: String,
    pub evaluated_at: DateTime<Utc>,
}

pub async fn insert_batch(
    db: &DatabaseConnection,
    records: Vec<EvaluationRecord>,
) -> anyhow::Result<()> {
    let rows = records
        .into_iter()
        .map(|record| evaluation_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            project_id: Set(record.project_id),
            flag_key: Set(record.flag_key),
            environment_key: Set(record.environment_key),
            subject_id: Set(record.subject_id),
            context_snapshot: Set(record.context),
            enabled: Set(record.enabled),
            variant_key: Set(record.variant_key),
            matched_rule_id: Set(record.matched_rule_id),
            reason: Set(record.reason),
            evaluated_at: Set(record.evaluated_at),
        })
        .collect::<Vec<_>>();

    evaluation_log::Entity::insert_many(rows)
        .on_empty_do_nothing()
        .exec(db)
        .await?;
    Ok(())
}

/// Time-range retention: delete rows older than `cutoff`.
pub async fn prune_before(db: &DatabaseConnection, cutoff: DateTime<Utc>) -> anyhow::Result<u64> {
    let result = evaluation_log::Entity::delete_many()
        .filter(evaluation_log::Column::EvaluatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
