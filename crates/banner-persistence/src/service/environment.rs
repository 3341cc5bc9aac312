//! Environment service layer

use anyhow::bail;
use banner_common::{validate_key, BannerError};
use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::{environment, flag, flag_environment};
use crate::service::audit::{self, AuditEntry};

/// Create an environment and materialize a disabled overlay for every
/// existing flag of the project.
pub async fn create(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    key: &str,
    name: &str,
    production_flag: bool,
) -> anyhow::Result<environment::Model> {
    validate_key("environment key", key)?;

    let existing = environment::Entity::find()
        .filter(environment::Column::ProjectId.eq(project_id))
        .filter(
            Condition::any()
                .add(environment::Column::Key.eq(key))
                .add(environment::Column::Name.eq(name)),
        )
        .one(db)
        .await?;
    if existing.is_some() {
        bail!(BannerError::conflict(format!(
            "environment '{}' already exists",
            key
        )));
    }

    let position = environment::Entity::find()
        .filter(environment::Column::ProjectId.eq(project_id))
        .count(db)
        .await? as i32;

    let flags = flag::Entity::find()
        .filter(flag::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;

    let tx = db.begin().await?;
    let now = Utc::now();

    let model = environment::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        key: Set(key.to_string()),
        name: Set(name.to_string()),
        production_flag: Set(production_flag),
        position: Set(position),
        created_at: Set(now),
    };
    let created = model.insert(&tx).await?;

    // New flags start disabled everywhere; the same applies to existing
    // flags in a new environment.
    let overlays = flags
        .iter()
        .map(|f| flag_environment::ActiveModel {
            id: Set(Uuid::new_v4()),
            flag_id: Set(f.id),
            environment_id: Set(created.id),
            enabled: Set(false),
            percentage: Set(0),
            default_variant_id: Set(None),
            enable_at: Set(None),
            disable_at: Set(None),
            metadata: Set(serde_json::json!({})),
            updated_at: Set(now),
        })
        .collect::<Vec<_>>();

    flag_environment::Entity::insert_many(overlays)
        .on_empty_do_nothing()
        .exec(&tx)
        .await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "CREATE",
            resource_type: "ENVIRONMENT",
            resource_key: key,
            detail: None,
        },
    )
    .await?;

    tx.commit().await?;
    Ok(created)
}

pub async fn list(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> anyhow::Result<Vec<environment::Model>> {
    Ok(environment::Entity::find()
        .filter(environment::Column::ProjectId.eq(project_id))
        .order_by_asc(environment::Column::Position)
        .all(db)
        .await?)
}

