//! Flag entity
//!
//! The flag row carries the project-wide identity and type of a toggle.
//! Per-environment state lives on `flag_environment`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "flag")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    /// Unique per project
    pub key: String,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Flag type: boolean, percentage, variant, segment
    pub kind: String,
    /// JSON array of free-form tag strings
    pub tags: Json,
    pub archived: bool,
    /// A permanent flag is not destructible; archival is its only terminal
    /// state.
    pub permanent: bool,
    pub owner_email: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
