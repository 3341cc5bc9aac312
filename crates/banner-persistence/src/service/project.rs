//! Project service layer

use anyhow::bail;
use banner_common::{validate_key, BannerError};
use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::project;

/// Create a project with freshly minted credentials.
///
/// Credential *distribution* is the identity collaborator's concern; the
/// store only persists the opaque values it will later resolve.
pub async fn create(
    db: &DatabaseConnection,
    key: &str,
    name: &str,
) -> anyhow::Result<project::Model> {
    validate_key("project key", key)?;

    if project::Entity::find()
        .filter(project::Column::Key.eq(key))
        .one(db)
        .await?
        .is_some()
    {
        bail!(BannerError::conflict(format!(
            "project '{}' already exists",
            key
        )));
    }

    let model = project::ActiveModel {
        id: Set(Uuid::new_v4()),
        key: Set(key.to_string()),
        name: Set(name.to_string()),
        sdk_key: Set(format!("sdk-{}", Uuid::new_v4().simple())),
        admin_token: Set(format!("adm-{}", Uuid::new_v4().simple())),
        created_at: Set(Utc::now()),
    };

    Ok(model.insert(db).await?)
}

/// Provision a default project on first boot so a fresh deployment is
/// usable without the external identity collaborator. The minted
/// credentials are logged once; rotating them is that collaborator's job.
pub async fn ensure_default(db: &DatabaseConnection) -> anyhow::Result<Option<project::Model>> {
    if project::Entity::find().count(db).await? > 0 {
        return Ok(None);
    }

    let created = create(db, "default", "Default").await?;
    tracing::info!(
        project = %created.key,
        sdk_key = %created.sdk_key,
        admin_token = %created.admin_token,
        "provisioned default project"
    );
    Ok(Some(created))
}

/// Resolve an `X-SDK-Key` credential to its project.
pub async fn find_by_sdk_key(
    db: &DatabaseConnection,
    sdk_key: &str,
) -> anyhow::Result<Option<project::Model>> {
    Ok(project::Entity::find()
        .filter(project::Column::SdkKey.eq(sdk_key))
        .one(db)
        .await?)
}

/// Resolve an admin bearer credential to its project.
pub async fn find_by_admin_token(
    db: &DatabaseConnection,
    token: &str,
) -> anyhow::Result<Option<project::Model>> {
    Ok(project::Entity::find()
        .filter(project::Column::AdminToken.eq(token))
        .one(db)
        .await?)
}
