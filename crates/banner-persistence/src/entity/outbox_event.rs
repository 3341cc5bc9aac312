//! Outbox event entity
//!
//! Every accepted mutation enqueues the cache invalidations and change-bus
//! events it implies as rows in this table, inside the same transaction as
//! the domain write. The drain applies them after commit and deletes the
//! rows; a background sweeper picks up anything a crashed process left
//! behind. Segment writes are expanded at write time into one row per
//! affected (flag, environment) pair.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbox_event")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    /// Event action, e.g. flag_created, flag_toggled, flag_archived
    pub action: String,
    pub flag_key: String,
    pub environment_key: String,
    /// Enabled state after the mutation, when the mutation has one
    pub enabled: Option<bool>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
