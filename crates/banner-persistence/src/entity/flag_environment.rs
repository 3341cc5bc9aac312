//! Flag-environment overlay entity
//!
//! Per-environment state of a flag: the enabled bit, rollout percentage,
//! default variant, scheduled transitions, and (via `flag_rule`) the
//! ordered targeting rules. Unique on `(flag_id, environment_id)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flag_environment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub flag_id: Uuid,
    pub environment_id: Uuid,
    pub enabled: bool,
    /// Rollout percentage in [0, 100], used by percentage-type flags
    pub percentage: i32,
    pub default_variant_id: Option<Uuid>,
    /// Wall-clock time of a scheduled enable transition. Cleared by any
    /// manual toggle.
    pub enable_at: Option<DateTimeUtc>,
    /// Wall-clock time of a scheduled disable transition. Cleared by any
    /// manual toggle.
    pub disable_at: Option<DateTimeUtc>,
    pub metadata: Json,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
