//! Audit log entity
//!
//! One row per accepted mutation, committed in the same transaction as the
//! domain write.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    /// Actor identity supplied by the authentication layer; None for
    /// system-originated writes such as scheduled transitions.
    pub actor: Option<String>,
    /// Operation: CREATE, UPDATE, DELETE, TOGGLE, SCHEDULE, ARCHIVE, TRANSITION
    pub action: String,
    /// Resource type: FLAG, SEGMENT, ENVIRONMENT
    pub resource_type: String,
    pub resource_key: String,
    /// Additional details in JSON format
    pub detail: Option<Json>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
