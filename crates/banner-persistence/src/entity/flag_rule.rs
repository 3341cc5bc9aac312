//! Flag rule entity
//!
//! Persisted in wide-row form: `rule_type` discriminates which of the
//! nullable column groups is populated (segment reference, attribute
//! predicate, or user-id list). The in-memory model is the tagged
//! `RuleKind` in banner-core; the projection happens at snapshot build.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flag_rule")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub flag_environment_id: Uuid,
    /// Rule type: segment, attribute, user_id
    pub rule_type: String,
    pub position: i32,
    /// Populated for segment rules
    pub segment_id: Option<Uuid>,
    /// Populated for attribute rules
    pub attribute: Option<String>,
    pub operator: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub value: Option<String>,
    /// Populated for user_id rules: JSON array of subject ids
    pub user_ids: Option<Json>,
    pub serve_enabled: bool,
    pub serve_variant_id: Option<Uuid>,
    pub serve_percentage: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
