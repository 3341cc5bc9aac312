//! Flag service layer
//!
//! All flag mutations live here: create/update/delete, variant and rule
//! replacement, per-environment toggles, scheduled transitions, and the
//! archive cascade. Every write commits domain rows + audit row + outbox
//! rows in one transaction.

use anyhow::bail;
use banner_common::{validate_key, BannerError};
use banner_core::{FlagKind, Operator};
use chrono::{DateTime, Utc};
use sea_orm::{prelude::Expr, *};
use serde::Serialize;
use uuid::Uuid;

use crate::entity::{environment, flag, flag_environment, flag_rule, flag_variant, segment};
use crate::service::audit::{self, AuditEntry};
use crate::service::outbox::{self, PendingEvent};

/// Scheduled transition direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Enable,
    Disable,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Enable => "enable",
            TransitionKind::Disable => "disable",
        }
    }

    pub fn parse(s: &str) -> Option<TransitionKind> {
        match s {
            "enable" => Some(TransitionKind::Enable),
            "disable" => Some(TransitionKind::Disable),
            _ => None,
        }
    }
}

/// Fields of a new flag.
#[derive(Clone, Debug)]
pub struct FlagDraft {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: FlagKind,
    pub tags: Vec<String>,
    pub permanent: bool,
    pub owner_email: Option<String>,
}

/// Mutable flag metadata; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct FlagPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub permanent: Option<bool>,
    pub owner_email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct VariantDraft {
    pub key: String,
    pub name: String,
    pub payload: serde_json::Value,
    pub weight: i32,
}

#[derive(Clone, Debug)]
pub enum RuleDraftKind {
    Segment { segment_key: String },
    Attribute {
        attribute: String,
        operator: String,
        value: String,
    },
    UserId { user_ids: Vec<String> },
}

#[derive(Clone, Debug)]
pub struct RuleDraft {
    pub kind: RuleDraftKind,
    pub serve_enabled: bool,
    pub serve_variant_key: Option<String>,
    pub serve_percentage: Option<i32>,
}

/// Result of a fired scheduled transition, for logging and event fan-out.
#[derive(Clone, Debug)]
pub struct TransitionOutcome {
    pub project_id: Uuid,
    pub flag_key: String,
    pub environment_key: String,
    pub enabled: bool,
}

fn validate_percentage(value: i32) -> Result<(), BannerError> {
    if (0..=100).contains(&value) {
        Ok(())
    } else {
        Err(BannerError::validation(format!(
            "percentage {} out of range [0, 100]",
            value
        )))
    }
}

/// Create a flag and materialize one disabled overlay per existing
/// environment.
pub async fn create(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    draft: FlagDraft,
) -> anyhow::Result<flag::Model> {
    validate_key("flag key", &draft.key)?;

    if find_by_key(db, project_id, &draft.key).await?.is_some() {
        bail!(BannerError::conflict(format!(
            "flag '{}' already exists",
            draft.key
        )));
    }

    let environments = environment::Entity::find()
        .filter(environment::Column::ProjectId.eq(project_id))
        .all(db)
        .await?;

    let tx = db.begin().await?;
    let now = Utc::now();

    let model = flag::ActiveModel {
        id: Set(Uuid::new_v4()),
        project_id: Set(project_id),
        key: Set(draft.key.clone()),
        name: Set(draft.name),
        description: Set(draft.description),
        kind: Set(draft.kind.as_str().to_string()),
        tags: Set(serde_json::json!(draft.tags)),
        archived: Set(false),
        permanent: Set(draft.permanent),
        owner_email: Set(draft.owner_email),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let created = model.insert(&tx).await?;

    let overlays = environments
        .iter()
        .map(|env| flag_environment::ActiveModel {
            id: Set(Uuid::new_v4()),
            flag_id: Set(created.id),
            environment_id: Set(env.id),
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
            resource_type: "FLAG",
            resource_key: &draft.key,
            detail: None,
        },
    )
    .await?;

    let events = environments
        .iter()
        .map(|env| PendingEvent::new(project_id, "flag_created", &draft.key, &env.key, Some(false)))
        .collect();
    outbox::enqueue(&tx, events).await?;

    tx.commit().await?;
    Ok(created)
}

/// Update flag metadata.
pub async fn update(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
    patch: FlagPatch,
) -> anyhow::Result<flag::Model> {
    let existing = get_required(db, project_id, flag_key).await?;
    let states = overlay_states(db, project_id, existing.id).await?;

    let tx = db.begin().await?;

    let mut model: flag::ActiveModel = existing.into();
    if let Some(name) = patch.name {
        model.name = Set(name);
    }
    if let Some(description) = patch.description {
        model.description = Set(Some(description));
    }
    if let Some(tags) = patch.tags {
        model.tags = Set(serde_json::json!(tags));
    }
    if let Some(permanent) = patch.permanent {
        model.permanent = Set(permanent);
    }
    if let Some(owner_email) = patch.owner_email {
        model.owner_email = Set(Some(owner_email));
    }
    model.updated_at = Set(Utc::now());
    let updated = flag::Entity::update(model).exec(&tx).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "UPDATE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: None,
        },
    )
    .await?;

    let events = states
        .iter()
        .map(|(env_key, enabled)| {
            PendingEvent::new(project_id, "flag_updated", flag_key, env_key, Some(*enabled))
        })
        .collect();
    outbox::enqueue(&tx, events).await?;

    tx.commit().await?;
    Ok(updated)
}

pub async fn find_by_key(
    db: &DatabaseConnection,
    project_id: Uuid,
    key: &str,
) -> anyhow::Result<Option<flag::Model>> {
    Ok(flag::Entity::find()
        .filter(flag::Column::ProjectId.eq(project_id))
        .filter(flag::Column::Key.eq(key))
        .one(db)
        .await?)
}

pub async fn get_required(
    db: &DatabaseConnection,
    project_id: Uuid,
    key: &str,
) -> anyhow::Result<flag::Model> {
    match find_by_key(db, project_id, key).await? {
        Some(model) => Ok(model),
        None => bail!(BannerError::not_found("flag", key)),
    }
}

/// One page of a project's flag list, in key order.
///
/// `total` counts every flag matching the filter, not just this page, so
/// the dashboard can render page controls from a single response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagPage {
    pub flags: Vec<flag::Model>,
    pub total: u64,
    pub page_no: u64,
    pub page_size: u64,
}

/// List flags with pagination, optionally including archived ones.
pub async fn list(
    db: &DatabaseConnection,
    project_id: Uuid,
    page_no: u64,
    page_size: u64,
    include_archived: bool,
) -> anyhow::Result<FlagPage> {
    let mut count_select = flag::Entity::find().filter(flag::Column::ProjectId.eq(project_id));
    let mut query_select = flag::Entity::find().filter(flag::Column::ProjectId.eq(project_id));

    if !include_archived {
        count_select = count_select.filter(flag::Column::Archived.eq(false));
        query_select = query_select.filter(flag::Column::Archived.eq(false));
    }

    let offset = page_no.saturating_sub(1) * page_size;

    let (count_result, data_result) = tokio::join!(
        count_select.count(db),
        query_select
            .order_by_asc(flag::Column::Key)
            .offset(offset)
            .limit(page_size)
            .all(db)
    );

    Ok(FlagPage {
        flags: data_result?,
        total: count_result?,
        page_no,
        page_size,
    })
}

/// All non-archived flags of a project, in key order.
pub async fn list_active(
    db: &DatabaseConnection,
    project_id: Uuid,
) -> anyhow::Result<Vec<flag::Model>> {
    Ok(flag::Entity::find()
        .filter(flag::Column::ProjectId.eq(project_id))
        .filter(flag::Column::Archived.eq(false))
        .order_by_asc(flag::Column::Key)
        .all(db)
        .await?)
}

/// Replace the variant list of a flag.
///
/// Existing variants are matched by key so their ids (and any rule or
/// default-variant references to them) survive a reweighting. Removed
/// variants have their references cleared explicitly in the same
/// transaction.
pub async fn set_variants(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
    drafts: Vec<VariantDraft>,
) -> anyhow::Result<Vec<flag_variant::Model>> {
    let flag = get_required(db, project_id, flag_key).await?;

    for draft in &drafts {
        validate_key("variant key", &draft.key)?;
        if draft.weight < 0 {
            bail!(BannerError::validation(format!(
                "variant '{}' has negative weight {}",
                draft.key, draft.weight
            )));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for draft in &drafts {
        if !seen.insert(draft.key.as_str()) {
            bail!(BannerError::conflict(format!(
                "duplicate variant key '{}'",
                draft.key
            )));
        }
    }

    let existing = flag_variant::Entity::find()
        .filter(flag_variant::Column::FlagId.eq(flag.id))
        .all(db)
        .await?;
    let states = overlay_states(db, project_id, flag.id).await?;

    let tx = db.begin().await?;

    let mut kept = Vec::with_capacity(drafts.len());
    for (position, draft) in drafts.iter().enumerate() {
        match existing.iter().find(|v| v.key == draft.key) {
            Some(current) => {
                let mut model: flag_variant::ActiveModel = current.clone().into();
                model.name = Set(draft.name.clone());
                model.payload = Set(draft.payload.clone());
                model.weight = Set(draft.weight);
                model.position = Set(position as i32);
                kept.push(flag_variant::Entity::update(model).exec(&tx).await?);
            }
            None => {
                let model = flag_variant::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    flag_id: Set(flag.id),
                    key: Set(draft.key.clone()),
                    name: Set(draft.name.clone()),
                    payload: Set(draft.payload.clone()),
                    weight: Set(draft.weight),
                    position: Set(position as i32),
                };
                kept.push(model.insert(&tx).await?);
            }
        }
    }

    // Clear references to removed variants before deleting them.
    let removed: Vec<Uuid> = existing
        .iter()
        .filter(|v| !drafts.iter().any(|d| d.key == v.key))
        .map(|v| v.id)
        .collect();
    if !removed.is_empty() {
        flag_rule::Entity::update_many()
            .col_expr(
                flag_rule::Column::ServeVariantId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(flag_rule::Column::ServeVariantId.is_in(removed.clone()))
            .exec(&tx)
            .await?;
        flag_environment::Entity::update_many()
            .col_expr(
                flag_environment::Column::DefaultVariantId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(flag_environment::Column::FlagId.eq(flag.id))
            .filter(flag_environment::Column::DefaultVariantId.is_in(removed.clone()))
            .exec(&tx)
            .await?;
        flag_variant::Entity::delete_many()
            .filter(flag_variant::Column::Id.is_in(removed))
            .exec(&tx)
            .await?;
    }

    // Variant flags keep a default variant whenever variants exist.
    if flag.kind == FlagKind::Variant.as_str()
        && let Some(first) = kept.first()
    {
        flag_environment::Entity::update_many()
            .col_expr(
                flag_environment::Column::DefaultVariantId,
                Expr::value(Some(first.id)),
            )
            .filter(flag_environment::Column::FlagId.eq(flag.id))
            .filter(flag_environment::Column::DefaultVariantId.is_null())
            .exec(&tx)
            .await?;
    }

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "UPDATE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: Some(serde_json::json!({"variants": drafts.len()})),
        },
    )
    .await?;

    let events = states
        .iter()
        .map(|(env_key, enabled)| {
            PendingEvent::new(project_id, "flag_updated", flag_key, env_key, Some(*enabled))
        })
        .collect();
    outbox::enqueue(&tx, events).await?;

    tx.commit().await?;
    Ok(kept)
}

/// Replace the ordered rule list of one flag-environment overlay.
pub async fn replace_rules(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
    environment_key: &str,
    drafts: Vec<RuleDraft>,
) -> anyhow::Result<Vec<flag_rule::Model>> {
    let flag = get_required(db, project_id, flag_key).await?;
    let overlay = get_overlay(db, project_id, &flag, environment_key).await?;

    let variants = flag_variant::Entity::find()
        .filter(flag_variant::Column::FlagId.eq(flag.id))
        .all(db)
        .await?;

    // Validate drafts and resolve referenced keys before touching anything.
    let mut resolved = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        if let Some(p) = draft.serve_percentage {
            validate_percentage(p)?;
        }

        let serve_variant_id = match &draft.serve_variant_key {
            Some(key) => {
                if flag.kind != FlagKind::Variant.as_str() {
                    bail!(BannerError::validation(format!(
                        "serve_variant is only valid on variant flags, flag '{}' is {}",
                        flag_key, flag.kind
                    )));
                }
                match variants.iter().find(|v| &v.key == key) {
                    Some(variant) => Some(variant.id),
                    None => bail!(BannerError::not_found("variant", key)),
                }
            }
            None => None,
        };

        let kind = match &draft.kind {
            RuleDraftKind::Segment { segment_key } => {
                let seg = segment::Entity::find()
                    .filter(segment::Column::ProjectId.eq(project_id))
                    .filter(segment::Column::Key.eq(segment_key.as_str()))
                    .one(db)
                    .await?;
                match seg {
                    Some(seg) => ("segment", Some(seg.id), None, None, None, None),
                    None => bail!(BannerError::not_found("segment", segment_key)),
                }
            }
            RuleDraftKind::Attribute {
                attribute,
                operator,
                value,
            } => {
                if Operator::parse(operator).is_none() {
                    bail!(BannerError::validation(format!(
                        "unknown operator '{}'",
                        operator
                    )));
                }
                (
                    "attribute",
                    None,
                    Some(attribute.clone()),
                    Some(operator.clone()),
                    Some(value.clone()),
                    None,
                )
            }
            RuleDraftKind::UserId { user_ids } => (
                "user_id",
                None,
                None,
                None,
                None,
                Some(serde_json::json!(user_ids)),
            ),
        };
        resolved.push((kind, serve_variant_id));
    }

    let overlay_enabled = overlay.enabled;

    let tx = db.begin().await?;

    flag_rule::Entity::delete_many()
        .filter(flag_rule::Column::FlagEnvironmentId.eq(overlay.id))
        .exec(&tx)
        .await?;

    let mut inserted = Vec::with_capacity(drafts.len());
    for (position, (draft, ((rule_type, segment_id, attribute, operator, value, user_ids), serve_variant_id))) in
        drafts.iter().zip(resolved).enumerate()
    {
        let model = flag_rule::ActiveModel {
            id: Set(Uuid::new_v4()),
            flag_environment_id: Set(overlay.id),
            rule_type: Set(rule_type.to_string()),
            position: Set(position as i32),
            segment_id: Set(segment_id),
            attribute: Set(attribute),
            operator: Set(operator),
            value: Set(value),
            user_ids: Set(user_ids),
            serve_enabled: Set(draft.serve_enabled),
            serve_variant_id: Set(serve_variant_id),
            serve_percentage: Set(draft.serve_percentage),
        };
        inserted.push(model.insert(&tx).await?);
    }

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "UPDATE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: Some(serde_json::json!({
                "environment": environment_key,
                "rules": inserted.len(),
            })),
        },
    )
    .await?;

    outbox::enqueue(
        &tx,
        vec![PendingEvent::new(
            project_id,
            "flag_updated",
            flag_key,
            environment_key,
            Some(overlay_enabled),
        )],
    )
    .await?;

    tx.commit().await?;
    Ok(inserted)
}

/// Update per-environment rollout settings.
pub async fn update_overlay(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
    environment_key: &str,
    percentage: Option<i32>,
    default_variant_key: Option<&str>,
) -> anyhow::Result<flag_environment::Model> {
    let flag = get_required(db, project_id, flag_key).await?;
    let overlay = get_overlay(db, project_id, &flag, environment_key).await?;

    let default_variant_id = match default_variant_key {
        Some(key) => {
            if flag.kind != FlagKind::Variant.as_str() {
                bail!(BannerError::validation(format!(
                    "default_variant is only valid on variant flags, flag '{}' is {}",
                    flag_key, flag.kind
                )));
            }
            let variant = flag_variant::Entity::find()
                .filter(flag_variant::Column::FlagId.eq(flag.id))
                .filter(flag_variant::Column::Key.eq(key))
                .one(db)
                .await?;
            match variant {
                Some(variant) => Some(variant.id),
                None => bail!(BannerError::not_found("variant", key)),
            }
        }
        None => None,
    };

    if let Some(p) = percentage {
        validate_percentage(p)?;
    }

    let tx = db.begin().await?;

    let enabled = overlay.enabled;
    let mut model: flag_environment::ActiveModel = overlay.into();
    if let Some(p) = percentage {
        model.percentage = Set(p);
    }
    if let Some(id) = default_variant_id {
        model.default_variant_id = Set(Some(id));
    }
    model.updated_at = Set(Utc::now());
    let updated = flag_environment::Entity::update(model).exec(&tx).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "UPDATE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: Some(serde_json::json!({"environment": environment_key})),
        },
    )
    .await?;

    outbox::enqueue(
        &tx,
        vec![PendingEvent::new(
            project_id,
            "flag_updated",
            flag_key,
            environment_key,
            Some(enabled),
        )],
    )
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Manually toggle a flag in one environment.
///
/// Clears both scheduled transition times for the overlay; the caller is
/// expected to cancel any in-process timer handles as well.
pub async fn toggle(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
    environment_key: &str,
    enabled: bool,
) -> anyhow::Result<flag_environment::Model> {
    let flag = get_required(db, project_id, flag_key).await?;
    if flag.archived {
        bail!(BannerError::conflict(format!(
            "flag '{}' is archived",
            flag_key
        )));
    }
    let overlay = get_overlay(db, project_id, &flag, environment_key).await?;

    let tx = db.begin().await?;

    let mut model: flag_environment::ActiveModel = overlay.into();
    model.enabled = Set(enabled);
    model.enable_at = Set(None);
    model.disable_at = Set(None);
    model.updated_at = Set(Utc::now());
    let updated = flag_environment::Entity::update(model).exec(&tx).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "TOGGLE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: Some(serde_json::json!({
                "environment": environment_key,
                "enabled": enabled,
            })),
        },
    )
    .await?;

    outbox::enqueue(
        &tx,
        vec![PendingEvent::new(
            project_id,
            "flag_toggled",
            flag_key,
            environment_key,
            Some(enabled),
        )],
    )
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Persist a scheduled transition time on the overlay.
///
/// Writing a new schedule for the same (overlay, kind) supersedes the
/// previous one; in-process timer handles are superseded by the caller.
pub async fn schedule(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
    environment_key: &str,
    kind: TransitionKind,
    at: DateTime<Utc>,
) -> anyhow::Result<flag_environment::Model> {
    let flag = get_required(db, project_id, flag_key).await?;
    if flag.archived {
        bail!(BannerError::conflict(format!(
            "flag '{}' is archived",
            flag_key
        )));
    }
    let overlay = get_overlay(db, project_id, &flag, environment_key).await?;

    let tx = db.begin().await?;

    let enabled = overlay.enabled;
    let mut model: flag_environment::ActiveModel = overlay.into();
    match kind {
        TransitionKind::Enable => model.enable_at = Set(Some(at)),
        TransitionKind::Disable => model.disable_at = Set(Some(at)),
    }
    model.updated_at = Set(Utc::now());
    let updated = flag_environment::Entity::update(model).exec(&tx).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "SCHEDULE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: Some(serde_json::json!({
                "environment": environment_key,
                "kind": kind.as_str(),
                "at": at.to_rfc3339(),
            })),
        },
    )
    .await?;

    outbox::enqueue(
        &tx,
        vec![PendingEvent::new(
            project_id,
            "flag_scheduled",
            flag_key,
            environment_key,
            Some(enabled),
        )],
    )
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Apply a fired scheduled transition.
///
/// Re-reads the overlay at firing time: a cleared schedule field means the
/// transition was cancelled (manual toggles clear both fields) and the
/// firing is a no-op. Otherwise the enabled bit is applied
/// last-writer-wins and the schedule field consumed, which also makes a
/// duplicate firing harmless.
pub async fn apply_transition(
    db: &DatabaseConnection,
    overlay_id: Uuid,
    kind: TransitionKind,
) -> anyhow::Result<Option<TransitionOutcome>> {
    let Some(overlay) = flag_environment::Entity::find_by_id(overlay_id).one(db).await? else {
        return Ok(None);
    };

    let armed = match kind {
        TransitionKind::Enable => overlay.enable_at.is_some(),
        TransitionKind::Disable => overlay.disable_at.is_some(),
    };
    if !armed {
        return Ok(None);
    }

    let Some(flag) = flag::Entity::find_by_id(overlay.flag_id).one(db).await? else {
        return Ok(None);
    };
    let Some(env) = environment::Entity::find_by_id(overlay.environment_id)
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let enabled = kind == TransitionKind::Enable;

    let tx = db.begin().await?;

    let mut model: flag_environment::ActiveModel = overlay.into();
    model.enabled = Set(enabled);
    match kind {
        TransitionKind::Enable => model.enable_at = Set(None),
        TransitionKind::Disable => model.disable_at = Set(None),
    }
    model.updated_at = Set(Utc::now());
    flag_environment::Entity::update(model).exec(&tx).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id: flag.project_id,
            actor: None,
            action: "TRANSITION",
            resource_type: "FLAG",
            resource_key: &flag.key,
            detail: Some(serde_json::json!({
                "environment": env.key,
                "kind": kind.as_str(),
            })),
        },
    )
    .await?;

    outbox::enqueue(
        &tx,
        vec![PendingEvent::new(
            flag.project_id,
            "flag_transitioned",
            &flag.key,
            &env.key,
            Some(enabled),
        )],
    )
    .await?;

    tx.commit().await?;

    Ok(Some(TransitionOutcome {
        project_id: flag.project_id,
        flag_key: flag.key,
        environment_key: env.key,
        enabled,
    }))
}

/// Archive a flag: forces `enabled = false` across every overlay and
/// clears pending schedules, in one transaction.
pub async fn archive(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
) -> anyhow::Result<flag::Model> {
    let existing = get_required(db, project_id, flag_key).await?;
    let states = overlay_states(db, project_id, existing.id).await?;
    let flag_id = existing.id;

    let tx = db.begin().await?;

    let mut model: flag::ActiveModel = existing.into();
    model.archived = Set(true);
    model.updated_at = Set(Utc::now());
    let archived = flag::Entity::update(model).exec(&tx).await?;

    flag_environment::Entity::update_many()
        .col_expr(flag_environment::Column::Enabled, Expr::value(false))
        .col_expr(
            flag_environment::Column::EnableAt,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .col_expr(
            flag_environment::Column::DisableAt,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .filter(flag_environment::Column::FlagId.eq(flag_id))
        .exec(&tx)
        .await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "ARCHIVE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: None,
        },
    )
    .await?;

    let events = states
        .iter()
        .map(|(env_key, _)| {
            PendingEvent::new(project_id, "flag_archived", flag_key, env_key, Some(false))
        })
        .collect();
    outbox::enqueue(&tx, events).await?;

    tx.commit().await?;
    Ok(archived)
}

/// Delete a flag and its variants, overlays, and rules.
///
/// Permanent flags are not destructible; archival is their only terminal
/// state.
pub async fn delete(
    db: &DatabaseConnection,
    project_id: Uuid,
    actor: Option<&str>,
    flag_key: &str,
) -> anyhow::Result<()> {
    let existing = get_required(db, project_id, flag_key).await?;
    if existing.permanent {
        bail!(BannerError::conflict(format!(
            "flag '{}' is permanent and cannot be deleted",
            flag_key
        )));
    }
    let states = overlay_states(db, project_id, existing.id).await?;

    let overlay_ids: Vec<Uuid> = flag_environment::Entity::find()
        .filter(flag_environment::Column::FlagId.eq(existing.id))
        .all(db)
        .await?
        .into_iter()
        .map(|o| o.id)
        .collect();

    let tx = db.begin().await?;

    if !overlay_ids.is_empty() {
        flag_rule::Entity::delete_many()
            .filter(flag_rule::Column::FlagEnvironmentId.is_in(overlay_ids))
            .exec(&tx)
            .await?;
    }
    flag_environment::Entity::delete_many()
        .filter(flag_environment::Column::FlagId.eq(existing.id))
        .exec(&tx)
        .await?;
    flag_variant::Entity::delete_many()
        .filter(flag_variant::Column::FlagId.eq(existing.id))
        .exec(&tx)
        .await?;
    flag::Entity::delete_by_id(existing.id).exec(&tx).await?;

    audit::record(
        &tx,
        AuditEntry {
            project_id,
            actor,
            action: "DELETE",
            resource_type: "FLAG",
            resource_key: flag_key,
            detail: None,
        },
    )
    .await?;

    let events = states
        .iter()
        .map(|(env_key, _)| PendingEvent::new(project_id, "flag_deleted", flag_key, env_key, None))
        .collect();
    outbox::enqueue(&tx, events).await?;

    tx.commit().await?;
    Ok(())
}

/// Overlay ids of a flag, for scheduler handle cleanup.
pub async fn overlay_ids(db: &DatabaseConnection, flag_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
    Ok(flag_environment::Entity::find()
        .filter(flag_environment::Column::FlagId.eq(flag_id))
        .all(db)
        .await?
        .into_iter()
        .map(|overlay| overlay.id)
        .collect())
}

/// Overlays of a flag due for re-arming: `(overlay_id, kind, at)` for every
/// pending schedule field. Used by the scheduler's startup scan.
pub async fn pending_transitions(
    db: &DatabaseConnection,
) -> anyhow::Result<Vec<(Uuid, TransitionKind, DateTime<Utc>)>> {
    let overlays = flag_environment::Entity::find()
        .filter(
            Condition::any()
                .add(flag_environment::Column::EnableAt.is_not_null())
                .add(flag_environment::Column::DisableAt.is_not_null()),
        )
        .all(db)
        .await?;

    let mut pending = Vec::new();
    for overlay in overlays {
        if let Some(at) = overlay.enable_at {
            pending.push((overlay.id, TransitionKind::Enable, at));
        }
        if let Some(at) = overlay.disable_at {
            pending.push((overlay.id, TransitionKind::Disable, at));
        }
    }
    Ok(pending)
}

async fn get_overlay(
    db: &DatabaseConnection,
    project_id: Uuid,
    flag: &flag::Model,
    environment_key: &str,
) -> anyhow::Result<flag_environment::Model> {
    let Some(env) = environment::Entity::find()
        .filter(environment::Column::ProjectId.eq(project_id))
        .filter(environment::Column::Key.eq(environment_key))
        .one(db)
        .await?
    else {
        bail!(BannerError::not_found("environment", environment_key));
    };

    match flag_environment::Entity::find()
        .filter(flag_environment::Column::FlagId.eq(flag.id))
        .filter(flag_environment::Column::EnvironmentId.eq(env.id))
        .one(db)
        .await?
    {
        Some(overlay) => Ok(overlay),
        None => bail!(BannerError::not_found(
            "flag environment",
            &format!("{}/{}", flag.key, environment_key)
        )),
    }
}

/// `(environment_key, enabled)` for every overlay of a flag.
async fn overlay_states(
    db: &DatabaseConnection,
    project_id: Uuid,
    flag_id: Uuid,
) -> anyhow::Result<Vec<(String, bool)>> {
    let (environments, overlays) = tokio::join!(
        environment::Entity::find()
            .filter(environment::Column::ProjectId.eq(project_id))
            .all(db),
        flag_environment::Entity::find()
            .filter(flag_environment::Column::FlagId.eq(flag_id))
            .all(db)
    );
    let environments = environments?;
    let overlays = overlays?;

    Ok(overlays
        .into_iter()
        .filter_map(|overlay| {
            environments
                .iter()
                .find(|env| env.id == overlay.environment_id)
                .map(|env| (env.key.clone(), overlay.enabled))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_kind_round_trip() {
        assert_eq!(TransitionKind::parse("enable"), Some(TransitionKind::Enable));
        assert_eq!(
            TransitionKind::parse("disable"),
            Some(TransitionKind::Disable)
        );
        assert!(TransitionKind::parse("pause").is_none());
        assert_eq!(TransitionKind::Enable.as_str(), "enable");
    }

    #[test]
    fn test_validate_percentage_bounds() {
        assert!(validate_percentage(0).is_ok());
        assert!(validate_percentage(100).is_ok());
        assert!(validate_percentage(-1).is_err());
        assert!(validate_percentage(101).is_err());
    }

    #[test]
    fn test_flag_page_wire_shape() {
        let page = FlagPage {
            flags: vec![],
            total: 41,
            page_no: 3,
            page_size: 20,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["total"], 41);
        assert_eq!(json["pageNo"], 3);
        assert_eq!(json["pageSize"], 20);
        assert!(json["flags"].as_array().unwrap().is_empty());
    }
}
