//! Snapshot building
//!
//! Projects persisted flag configuration into the self-contained
//! `FlagSnapshot` form the evaluator and cache consume. Segment references
//! are resolved inline here, which is why a segment write must invalidate
//! every snapshot that embeds it.

use banner_core::{
    FlagKind, FlagSnapshot, MatchType, Operator, OverlaySnapshot, RuleKind, RuleSnapshot,
    SegmentRuleSnapshot, SegmentSnapshot, VariantSnapshot,
};
use sea_orm::*;
use tracing::warn;
use uuid::Uuid;

use crate::entity::{environment, flag, flag_environment, flag_rule, flag_variant, segment, segment_rule};

/// Load the snapshot of one flag in one environment.
///
/// `Ok(None)` when the flag or the environment does not exist; a snapshot
/// with no overlay when the flag exists but has no row for the
/// environment.
pub async fn load_flag_snapshot(
    db: &DatabaseConnection,
    project_id: Uuid,
    flag_key: &str,
    environment_key: &str,
) -> anyhow::Result<Option<FlagSnapshot>> {
    let (flag_result, env_result) = tokio::join!(
        flag::Entity::find()
            .filter(flag::Column::ProjectId.eq(project_id))
            .filter(flag::Column::Key.eq(flag_key))
            .one(db),
        environment::Entity::find()
            .filter(environment::Column::ProjectId.eq(project_id))
            .filter(environment::Column::Key.eq(environment_key))
            .one(db)
    );

    let Some(flag) = flag_result? else {
        return Ok(None);
    };
    let Some(env) = env_result? else {
        return Ok(None);
    };

    let variants = flag_variant::Entity::find()
        .filter(flag_variant::Column::FlagId.eq(flag.id))
        .order_by_asc(flag_variant::Column::Position)
        .all(db)
        .await?;

    let overlay = flag_environment::Entity::find()
        .filter(flag_environment::Column::FlagId.eq(flag.id))
        .filter(flag_environment::Column::EnvironmentId.eq(env.id))
        .one(db)
        .await?;

    let overlay_snapshot = match overlay {
        Some(overlay) => Some(build_overlay(db, project_id, &overlay, &variants).await?),
        None => None,
    };

    Ok(Some(assemble(
        &flag,
        environment_key,
        overlay_snapshot,
        &variants,
    )))
}

/// Load snapshots for every non-archived flag of a project in one
/// environment, in key order. `Ok(None)` when the environment does not
/// exist.
pub async fn load_environment_snapshots(
    db: &DatabaseConnection,
    project_id: Uuid,
    environment_key: &str,
) -> anyhow::Result<Option<Vec<FlagSnapshot>>> {
    let Some(env) = environment::Entity::find()
        .filter(environment::Column::ProjectId.eq(project_id))
        .filter(environment::Column::Key.eq(environment_key))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let flags = crate::service::flag::list_active(db, project_id).await?;

    let mut snapshots = Vec::with_capacity(flags.len());
    for flag in &flags {
        let variants = flag_variant::Entity::find()
            .filter(flag_variant::Column::FlagId.eq(flag.id))
            .order_by_asc(flag_variant::Column::Position)
            .all(db)
            .await?;

        let overlay = flag_environment::Entity::find()
            .filter(flag_environment::Column::FlagId.eq(flag.id))
            .filter(flag_environment::Column::EnvironmentId.eq(env.id))
            .one(db)
            .await?;

        let overlay_snapshot = match overlay {
            Some(overlay) => Some(build_overlay(db, project_id, &overlay, &variants).await?),
            None => None,
        };

        snapshots.push(assemble(flag, environment_key, overlay_snapshot, &variants));
    }

    Ok(Some(snapshots))
}

fn assemble(
    flag: &flag::Model,
    environment_key: &str,
    overlay: Option<OverlaySnapshot>,
    variants: &[flag_variant::Model],
) -> FlagSnapshot {
    let kind = FlagKind::parse(&flag.kind).unwrap_or(FlagKind::Boolean);

    FlagSnapshot {
        project_id: flag.project_id,
        key: flag.key.clone(),
        kind,
        environment: environment_key.to_string(),
        overlay,
        variants: variants
            .iter()
            .map(|v| VariantSnapshot {
                key: v.key.clone(),
                weight: v.weight.max(0) as u32,
                payload: v.payload.clone(),
            })
            .collect(),
    }
}

async fn build_overlay(
    db: &DatabaseConnection,
    project_id: Uuid,
    overlay: &flag_environment::Model,
    variants: &[flag_variant::Model],
) -> anyhow::Result<OverlaySnapshot> {
    let rules = flag_rule::Entity::find()
        .filter(flag_rule::Column::FlagEnvironmentId.eq(overlay.id))
        .order_by_asc(flag_rule::Column::Position)
        .all(db)
        .await?;

    // Resolve referenced segments inline.
    let segment_ids: Vec<Uuid> = rules.iter().filter_map(|rule| rule.segment_id).collect();
    let segments = if segment_ids.is_empty() {
        vec![]
    } else {
        segment::Entity::find()
            .filter(segment::Column::ProjectId.eq(project_id))
            .filter(segment::Column::Id.is_in(segment_ids.clone()))
            .all(db)
            .await?
    };
    let segment_rules = if segment_ids.is_empty() {
        vec![]
    } else {
        segment_rule::Entity::find()
            .filter(segment_rule::Column::SegmentId.is_in(segment_ids))
            .order_by_asc(segment_rule::Column::Position)
            .all(db)
            .await?
    };

    let rule_snapshots = rules
        .iter()
        .filter_map(|rule| project_rule(rule, variants, &segments, &segment_rules))
        .collect();

    let default_variant = overlay
        .default_variant_id
        .and_then(|id| variants.iter().find(|v| v.id == id))
        .map(|v| v.key.clone());

    Ok(OverlaySnapshot {
        enabled: overlay.enabled,
        percentage: overlay.percentage.clamp(0, 100) as u32,
        default_variant,
        rules: rule_snapshots,
    })
}

/// Project a wide-row rule into the tagged in-memory form. A row whose
/// discriminated columns are inconsistent is skipped with a warning rather
/// than failing the whole snapshot.
fn project_rule(
    rule: &flag_rule::Model,
    variants: &[flag_variant::Model],
    segments: &[segment::Model],
    segment_rules: &[segment_rule::Model],
) -> Option<RuleSnapshot> {
    let kind = match rule.rule_type.as_str() {
        "segment" => {
            let segment_id = rule.segment_id?;
            let seg = segments.iter().find(|s| s.id == segment_id)?;
            Some(RuleKind::Segment {
                segment: SegmentSnapshot {
                    key: seg.key.clone(),
                    match_type: MatchType::parse(&seg.match_type).unwrap_or(MatchType::All),
                    rules: segment_rules
                        .iter()
                        .filter(|r| r.segment_id == segment_id)
                        .filter_map(|r| {
                            Some(SegmentRuleSnapshot {
                                attribute: r.attribute.clone(),
                                operator: Operator::parse(&r.operator)?,
                                value: r.value.clone(),
                            })
                        })
                        .collect(),
                },
            })
        }
        "attribute" => {
            let attribute = rule.attribute.clone()?;
            let operator = Operator::parse(rule.operator.as_deref()?)?;
            let value = rule.value.clone()?;
            Some(RuleKind::Attribute {
                attribute,
                operator,
                value,
            })
        }
        "user_id" => {
            let user_ids = rule
                .user_ids
                .as_ref()
                .and_then(|json| serde_json::from_value::<Vec<String>>(json.clone()).ok())?;
            Some(RuleKind::UserId { user_ids })
        }
        other => {
            warn!(rule_id = %rule.id, rule_type = other, "unknown rule type, skipping rule");
            None
        }
    };

    let kind = match kind {
        Some(kind) => kind,
        None => {
            warn!(rule_id = %rule.id, "inconsistent rule row, skipping rule");
            return None;
        }
    };

    let serve_variant = rule
        .serve_variant_id
        .and_then(|id| variants.iter().find(|v| v.id == id))
        .map(|v| v.key.clone());

    Some(RuleSnapshot {
        id: rule.id,
        kind,
        serve_enabled: rule.serve_enabled,
        serve_variant,
        serve_percentage: rule.serve_percentage.map(|p| p.clamp(0, 100) as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn variant_row(id: u128, key: &str, weight: i32, position: i32) -> flag_variant::Model {
        flag_variant::Model {
            id: Uuid::from_u128(id),
            flag_id: Uuid::from_u128(99),
            key: key.to_string(),
            name: key.to_string(),
            payload: serde_json::Value::Null,
            weight,
            position,
        }
    }

    fn rule_row(id: u128, rule_type: &str) -> flag_rule::Model {
        flag_rule::Model {
            id: Uuid::from_u128(id),
            flag_environment_id: Uuid::from_u128(50),
            rule_type: rule_type.to_string(),
            position: 0,
            segment_id: None,
            attribute: None,
            operator: None,
            value: None,
            user_ids: None,
            serve_enabled: true,
            serve_variant_id: None,
            serve_percentage: None,
        }
    }

    #[test]
    fn test_project_attribute_rule() {
        let mut row = rule_row(1, "attribute");
        row.attribute = Some("plan".to_string());
        row.operator = Some("eq".to_string());
        row.value = Some("pro".to_string());

        let snapshot = project_rule(&row, &[], &[], &[]).unwrap();
        assert!(matches!(
            snapshot.kind,
            RuleKind::Attribute { ref attribute, operator: Operator::Eq, ref value }
                if attribute == "plan" && value == "pro"
        ));
    }

    #[test]
    fn test_project_user_id_rule() {
        let mut row = rule_row(2, "user_id");
        row.user_ids = Some(serde_json::json!(["u1", "u2"]));
        let snapshot = project_rule(&row, &[], &[], &[]).unwrap();
        assert!(matches!(
            snapshot.kind,
            RuleKind::UserId { ref user_ids } if user_ids == &["u1", "u2"]
        ));
    }

    #[test]
    fn test_inconsistent_rule_row_is_skipped() {
        // attribute rule with no attribute column populated
        let row = rule_row(3, "attribute");
        assert!(project_rule(&row, &[], &[], &[]).is_none());

        // segment rule with no segment reference
        let row = rule_row(4, "segment");
        assert!(project_rule(&row, &[], &[], &[]).is_none());

        // unknown discriminator
        let row = rule_row(5, "geo");
        assert!(project_rule(&row, &[], &[], &[]).is_none());
    }

    #[test]
    fn test_serve_variant_resolved_by_id() {
        let variants = vec![variant_row(10, "control", 1, 0), variant_row(11, "test", 1, 1)];
        let mut row = rule_row(6, "user_id");
        row.user_ids = Some(serde_json::json!(["u1"]));
        row.serve_variant_id = Some(Uuid::from_u128(11));

        let snapshot = project_rule(&row, &variants, &[], &[]).unwrap();
        assert_eq!(snapshot.serve_variant.as_deref(), Some("test"));
    }

    #[test]
    fn test_assemble_clamps_and_orders() {
        let flag = flag::Model {
            id: Uuid::from_u128(99),
            project_id: Uuid::from_u128(1),
            key: "checkout".to_string(),
            name: "Checkout".to_string(),
            description: None,
            kind: "percentage".to_string(),
            tags: serde_json::json!([]),
            archived: false,
            permanent: false,
            owner_email: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let variants = vec![variant_row(10, "a", -3, 0)];
        let snapshot = assemble(&flag, "production", None, &variants);
        assert_eq!(snapshot.kind, FlagKind::Percentage);
        // Negative weights cannot reach the assigner.
        assert_eq!(snapshot.variants[0].weight, 0);
        assert!(snapshot.overlay.is_none());
    }
}
