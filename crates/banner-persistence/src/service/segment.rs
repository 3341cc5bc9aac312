//! Segment service layer
//!
//! Segment writes fan out: an updated segment changes the decision surface
//! of every flag whose rules reference it, so the outbox rows are expanded
//! to the affected (flag, environment) pairs at write time.

use anyhow::bail;
use banner_common::{validate_key, BannerError};
use banner_core::{MatchType, Operator};
use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::{environment, flag, flag_environment, flag_rule, segment, segment_rule};
use crate::service::audit::{self, AuditEntry};
use crate::service::outbox::{self, PendingEvent};

#[derive(Clone, Debug)]
pub struct SegmentRuleDraft {
    pub attribute: String,
    pub operator: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct SegmentDraft {
    pub key: String,
    pub name: String,
    pub match_type: MatchType,
    pub rules: Vec<SegmentRuleDraft>,
}

fn validate_rules(rules: &[SegmentRuleDraft]) -> anyhow::Result<()> {
    for rule in rules {
        if rule.attribute.is_empty() {
            bail!(BannerError::validation("segment rule attribute is empty"));
        }
        if Operator::parse(&rule.operator).is_none() {
            bail!(BannerError::validation(format!(
                "unknown operator '{}'",
                rule.operator
            )));
        }
    }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    draft: SegmentDraft,
) -> anyhow::Result<segment::Model> {
    validate_key("segment key", &draft.key)?;
    validate_rules(&draft.rules)?;

    if find_by_key(db, project_id, &draft.key).await?.is_some() {
        bail!(BannerError::conflict(format!(
            "segment '{}' already exists",
            draft.key
        )));
    }

    let tx = db.begin().await?;
    let now = Utc::now();

    let model = segment::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        key: Set(draft.key.clone()),
        name: Set(draft.name),
        match_type: Set(draft.match_type.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let created = model.insert(&tx).await?;

    insert_rules(&tx, created.id, &draft.rules).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "CREATE",
            resource_type: "SEGMENT",
            resource_key: &draft.key,
            detail: None,
        },
    )
    .await?;

    // A new segment is not referenced by any rule yet, so there is nothing
    // to invalidate or announce.
    tx.commit().await?;
    Ok(created)
}

/// Update a segment's name, match type, and rule list.
pub async fn update(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    key: &str,
    name: Option<String>,
    match_type: Option<MatchType>,
    rules: Option<Vec<SegmentRuleDraft>>,
) -> anyhow::Result<segment::Model> {
    let existing = get_required(db, project_id, key).await?;
    if let Some(rules) = &rules {
        validate_rules(rules)?;
    }

    let affected = affected_overlays(db, project_id, existing.id).await?;
    let segment_id = existing.id;

    let tx = db.begin().await?;

    let mut model: segment::ActiveModel = existing.into();
    if let Some(name) = name {
        model.name = Set(name);
    }
    if let Some(match_type) = match_type {
        model.match_type = Set(match_type.as_str().to_string());
    }
    model.updated_at = Set(Utc::now());
    let updated = segment::Entity::update(model).exec(&tx).await?;

    if let Some(rules) = &rules {
        segment_rule::Entity::delete_many()
            .filter(segment_rule::Column::SegmentId.eq(segment_id))
            .exec(&tx)
            .await?;
        insert_rules(&tx, segment_id, rules).await?;
    }

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "UPDATE",
            resource_type: "SEGMENT",
            resource_key: key,
            detail: None,
        },
    )
    .await?;

    let events = affected
        .iter()
        .map(|(flag_key, env_key, enabled)| {
            PendingEvent::new(project_id, "flag_updated", flag_key, env_key, Some(*enabled))
        })
        .collect();
    outbox::enqueue(&tx, events).await?;

    tx.commit().await?;
    Ok(updated)
}

/// Delete a segment.
///
/// Rejected with a caller-visible conflict while any flag rule references
/// the segment.
pub async fn delete(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    key: &str,
) -> anyhow::Result<()> {
    let existing = get_required(db, project_id, key).await?;

    let references = flag_rule::Entity::find()
        .filter(flag_rule::Column::SegmentId.eq(existing.id))
        .count(db)
        .await?;
    if references > 0 {
        bail!(BannerError::conflict(format!(
            "segment '{}' is referenced by {} flag rule(s)",
            key, references
        )));
    }

    let tx = db.begin().await?;

    segment_rule::Entity::delete_many()
        .filter(segment_rule::Column::SegmentId.eq(existing.id))
        .exec(&tx)
        .await?;
    segment::Entity::delete_by_id(existing.id).exec(&tx).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "DELETE",
            resource_type: "SEGMENT",
            resource_key: key,
            detail: None,
        },
    )
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn find_by_key(
    db: &DatabaseConnection,
    project_id: Uuid,
    key: &str,
) -> anyhow::Result<Option<segment::Model>> {
    Ok(segment::Entity::find()
        .filter(segment::Column::ProjectId.eq(project_id))
        .filter(segment::Column::Key.eq(key))
        .one(db)
        .await?)
}

pub async fn get_required(
    db: &DatabaseConnection,
    project_id: Uuid,
    key: &str,
) -> anyhow::Result<segment::Model> {
    match find_by_key(db, project_id, key).await? {
        Some(model) => Ok(model),
        None => bail!(BannerError::not_found("segment", key)),
    }
}

pub async fn list(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> anyhow::Result<Vec<segment::Model>> {
    Ok(segment::Entity::find()
        .filter(segment::Column::ProjectId.eq(project_id))
        .order_by_asc(segment::Column::Key)
        .all(db)
        .await?)
}

pub async fn rules_of(
    db: &DatabaseConnection,
    segment_id: Uuid,
) -> anyhow::Result<Vec<segment_rule::Model>> {
    Ok(segment_rule::Entity::find()
        .filter(segment_rule::Column::SegmentId.eq(segment_id))
        .order_by_asc(segment_rule::Column::Position)
        .all(db)
        .await?)
}

async fn insert_rules<C: ConnectionTrait>(
    conn: &C,
    segment_id: Uuid,
    rules: &[SegmentRuleDraft],
) -> anyhow::Result<()> {
    let rows = rules
        .iter()
        .enumerate()
        .map(|(position, rule)| segment_rule::ActiveModel {
            id: Set(Uuid::new_v4()),
            segment_id: Set(segment_id),
            attribute: Set(rule.attribute.clone()),
            operator: Set(rule.operator.clone()),
            value: Set(rule.value.clone()),
            position: Set(position as i32),
        })
        .collect::<Vec<_>>();

    segment_rule::Entity::insert_many(rows)
        .on_empty_do_nothing()
        .exec(conn)
        .await?;
    Ok(())
}

/// Every `(flag_key, environment_key, enabled)` whose rules reference the
/// segment.
async fn affected_overlays(
    db: &DatabaseConnection,
    project_id: Uuid,
    segment_id: Uuid,
) -> anyhow::Result<Vec<(String, String, bool)>> {
    let referencing = flag_rule::Entity::find()
        .filter(flag_rule::Column::SegmentId.eq(segment_id))
        .all(db)
        .await?;
    if referencing.is_empty() {
        return Ok(vec![]);
    }

    let overlay_ids: Vec<Uuid> = referencing
        .iter()
        .map(|rule| rule.flag_environment_id)
        .collect();
    let overlays = flag_environment::Entity::find()
        .filter(flag_environment::Column::Id.is_in(overlay_ids))
        .all(db)
        .await?;

    let (flags, environments) = tokio::join!(
        flag::Entity::find()
            .filter(flag::Column::ProjectId.eq(project_id))
            .all(db),
        environment::Entity::find()
            .filter(environment::Column::ProjectId.eq(project_id))
            .all(db)
    );
    let flags = flags?;
    let environments = environments?;

    Ok(overlays
        .into_iter()
        .filter_map(|overlay| {
            let flag = flags.iter().find(|f| f.id == overlay.flag_id)?;
            let env = environments
                .iter()
                .find(|e| e.id == overlay.environment_id)?;
            Some((flag.key.clone(), env.key.clone(), overlay.enabled))
        })
        .collect())
}
