//! Evaluation log entity
//!
//! Append-only record of decisions, written fire-and-forget off the
//! decision path. Rows are suitable for time-range partitioning; the
//! service only requires a monotonic `evaluated_at`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "evaluation_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    pub flag_key: String,
    pub environment_key: String,
    pub subject_id: Option<String>,
    /// Full normalized context at evaluation time
    pub context_snapshot: Json,
    pub enabled: bool,
    pub variant_key: Option<String>,
    pub matched_rule_id: Option<Uuid>,
    pub reason: String,
    pub evaluated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
