//! Audit row helper
//!
//! Called from inside every write transaction so the audit trail commits
//! or rolls back together with the domain change.

use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::audit_log;

pub struct AuditEntry<'a> {
    pub project_id: Uuid,
    pub actor: Option<&'a str>,
    pub action: &'a str,
    pub resource_type: &'a str,
    pub resource_key: &'a str,
    pub detail: Option<serde_json::Value>,
}

pub async fn record<C: ConnectionTrait>(conn: &C, entry: AuditEntry<'_>) -> anyhow::Result<()> {
    let row = audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(entry.project_id),
        actor: Set(entry.actor.map(str::to_string)),
        action: Set(entry.action.to_string()),
        resource_type: Set(entry.resource_type.to_string()),
        resource_key: Set(entry.resource_key.to_string()),
        detail: Set(entry.detail),
        created_at: Set(Utc::now()),
    };

    audit_log::Entity::insert(row).exec(conn).await?;
    Ok(())
}
