//! Project entity - the tenant boundary
//!
//! A project owns its environments, flags, segments, and credentials.
//! Every lookup in the service is project-scoped.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "project")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub key: String,
    pub name: String,
    /// Project-scoped SDK credential presented via `X-SDK-Key`
    #[sea_orm(unique)]
    pub sdk_key: String,
    /// Bearer credential for the administrative surface. Issuance is
    /// handled by the external identity collaborator.
    #[sea_orm(unique)]
    pub admin_token: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
