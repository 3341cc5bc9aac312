//! Flag evaluation
//!
//! Composes the rule walk, segment matching, bucketing, and variant
//! assignment into the per-flag-type decision algorithm. The evaluator is
//! pure over a snapshot: no mutation, no I/O, and identical output for
//! identical input.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::Context;
use crate::hasher::bucket;
use crate::rule;
use crate::snapshot::{FlagKind, FlagSnapshot};
use crate::variant;

/// Machine-readable explanation of how a decision was reached.
///
/// This is a closed set; the wire forms are bit-exact and SDKs dispatch on
/// them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    FlagNotFound,
    FlagDisabled,
    RuleMatch,
    /// A matched rule served a percentage split; carries the rule id.
    RulePercentage(Uuid),
    Default,
    PercentageRollout,
    VariantAssignment,
    NoSegmentMatch,
    Error,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::FlagNotFound => f.write_str("flag_not_found"),
            Reason::FlagDisabled => f.write_str("flag_disabled"),
            Reason::RuleMatch => f.write_str("rule_match"),
            Reason::RulePercentage(id) => write!(f, "rule_percentage_{}", id),
            Reason::Default => f.write_str("default"),
            Reason::PercentageRollout => f.write_str("percentage_rollout"),
            Reason::VariantAssignment => f.write_str("variant_assignment"),
            Reason::NoSegmentMatch => f.write_str("no_segment_match"),
            Reason::Error => f.write_str("error"),
        }
    }
}

/// The outcome of evaluating one flag for one subject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub enabled: bool,
    pub variant: Option<String>,
    /// Opaque payload of the chosen variant, when one was chosen and
    /// carries one.
    pub payload: Option<serde_json::Value>,
    pub reason: Reason,
    /// Id of the matched rule when a rule produced the decision.
    pub rule_id: Option<Uuid>,
    /// The subject identifier the decision was bucketed on.
    pub subject_id: Option<String>,
}

impl Decision {
    fn off(reason: Reason) -> Self {
        Decision {
            enabled: false,
            variant: None,
            payload: None,
            reason,
            rule_id: None,
            subject_id: None,
        }
    }

    /// Disabled decision used when the backend is unavailable; the decision
    /// path never fails open.
    pub fn error() -> Self {
        Decision::off(Reason::Error)
    }

    /// Disabled decision for an unknown flag or missing overlay.
    pub fn not_found() -> Self {
        Decision::off(Reason::FlagNotFound)
    }
}

/// Evaluate `snapshot` against `context`.
///
/// Steps, first terminating condition wins: missing overlay, disabled
/// overlay, rule walk, flag-type default.
pub fn evaluate(snapshot: &FlagSnapshot, context: &Context) -> Decision {
    let Some(overlay) = &snapshot.overlay else {
        return Decision::off(Reason::FlagNotFound);
    };

    if !overlay.enabled {
        return Decision::off(Reason::FlagDisabled);
    }

    let subject = resolve_subject(context, &snapshot.key);

    if let Some(matched) = rule::walk(
        &overlay.rules,
        snapshot.kind,
        &snapshot.key,
        context,
        &subject,
    ) {
        let reason = if matched.percentage_serve {
            Reason::RulePercentage(matched.rule_id)
        } else {
            Reason::RuleMatch
        };
        let payload = matched
            .variant
            .as_deref()
            .and_then(|key| snapshot.variant_payload(key))
            .filter(|p| !p.is_null())
            .cloned();
        return Decision {
            enabled: matched.enabled,
            variant: matched.variant,
            payload,
            reason,
            rule_id: Some(matched.rule_id),
            subject_id: Some(subject),
        };
    }

    match snapshot.kind {
        FlagKind::Boolean => Decision {
            enabled: true,
            variant: None,
            payload: None,
            reason: Reason::Default,
            rule_id: None,
            subject_id: Some(subject),
        },
        FlagKind::Percentage => {
            let b = bucket(&snapshot.key, &subject);
            Decision {
                enabled: b < overlay.percentage,
                variant: None,
                payload: None,
                reason: Reason::PercentageRollout,
                rule_id: None,
                subject_id: Some(subject),
            }
        }
        FlagKind::Variant => {
            let assigned = variant::assign(
                &snapshot.key,
                &snapshot.variants,
                &subject,
                overlay.default_variant.as_deref(),
            )
            .map(str::to_string);
            let payload = assigned
                .as_deref()
                .and_then(|key| snapshot.variant_payload(key))
                .filter(|p| !p.is_null())
                .cloned();
            Decision {
                enabled: true,
                variant: assigned,
                payload,
                reason: Reason::VariantAssignment,
                rule_id: None,
                subject_id: Some(subject),
            }
        }
        // Segment flags only serve through rules; the rules having passed,
        // the subject is simply not in any targeted segment.
        FlagKind::Segment => Decision {
            enabled: false,
            variant: None,
            payload: None,
            reason: Reason::NoSegmentMatch,
            rule_id: None,
            subject_id: Some(subject),
        },
    }
}

/// Resolve the bucketing subject, falling back to a fresh random identifier
/// when the context carries no stable identity. Determinism across calls is
/// lost on the fallback by design; callers responsible for stickiness must
/// supply a stable id.
fn resolve_subject(context: &Context, flag_key: &str) -> String {
    match context.subject_id() {
        Some(id) => id,
        None => {
            let random = Uuid::new_v4().to_string();
            tracing::trace!(
                flag_key,
                subject = %random,
                "context carries no stable subject id; decision is not sticky"
            );
            random
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;
    use crate::snapshot::{
        MatchType, OverlaySnapshot, RuleKind, RuleSnapshot, SegmentRuleSnapshot, SegmentSnapshot,
        VariantSnapshot,
    };
    use serde_json::json;

    fn boolean_flag(enabled: bool, rules: Vec<RuleSnapshot>) -> FlagSnapshot {
        FlagSnapshot {
            project_id: Uuid::nil(),
            key: "checkout".to_string(),
            kind: FlagKind::Boolean,
            environment: "production".to_string(),
            overlay: Some(OverlaySnapshot {
                enabled,
                percentage: 0,
                default_variant: None,
                rules,
            }),
            variants: vec![],
        }
    }

    fn user_id_rule(id: u128, user_ids: &[&str], serve_enabled: bool) -> RuleSnapshot {
        RuleSnapshot {
            id: Uuid::from_u128(id),
            kind: RuleKind::UserId {
                user_ids: user_ids.iter().map(|s| s.to_string()).collect(),
            },
            serve_enabled,
            serve_variant: None,
            serve_percentage: None,
        }
    }

    #[test]
    fn test_missing_overlay_is_not_found() {
        let mut flag = boolean_flag(true, vec![]);
        flag.overlay = None;
        let decision = evaluate(&flag, &Context::new());
        assert!(!decision.enabled);
        assert_eq!(decision.reason, Reason::FlagNotFound);
    }

    #[test]
    fn test_disabled_overlay_short_circuits_rules() {
        // A rule that matches everything must not run under a disabled
        // overlay.
        let rule = RuleSnapshot {
            id: Uuid::from_u128(1),
            kind: RuleKind::Attribute {
                attribute: "user_id".to_string(),
                operator: Operator::Neq,
                value: "".to_string(),
            },
            serve_enabled: true,
            serve_variant: None,
            serve_percentage: None,
        };
        let flag = boolean_flag(false, vec![rule]);
        let decision = evaluate(&flag, &Context::from_json(&json!({"user_id": "u1"})));
        assert!(!decision.enabled);
        assert_eq!(decision.reason, Reason::FlagDisabled);
        assert_eq!(decision.reason.to_string(), "flag_disabled");
    }

    #[test]
    fn test_user_id_rule_wins_then_boolean_default() {
        let flag = boolean_flag(true, vec![user_id_rule(1, &["u42"], true)]);

        let hit = evaluate(&flag, &Context::from_json(&json!({"user_id": "u42"})));
        assert!(hit.enabled);
        assert_eq!(hit.reason, Reason::RuleMatch);
        assert_eq!(hit.rule_id, Some(Uuid::from_u128(1)));

        // Rules exhausted under an enabled boolean overlay: default is ON.
        let miss = evaluate(&flag, &Context::from_json(&json!({"user_id": "u43"})));
        assert!(miss.enabled);
        assert_eq!(miss.reason, Reason::Default);
        assert_eq!(miss.rule_id, None);
    }

    #[test]
    fn test_percentage_rollout_determinism() {
        let flag = FlagSnapshot {
            project_id: Uuid::nil(),
            key: "checkout".to_string(),
            kind: FlagKind::Percentage,
            environment: "production".to_string(),
            overlay: Some(OverlaySnapshot {
                enabled: true,
                percentage: 50,
                default_variant: None,
                rules: vec![],
            }),
            variants: vec![],
        };

        // bucket("checkout", "alice") = 6 < 50.
        let alice = evaluate(&flag, &Context::from_json(&json!({"user_id": "alice"})));
        assert!(alice.enabled);
        assert_eq!(alice.reason, Reason::PercentageRollout);

        // bucket("checkout", "carol") = 95 >= 50.
        let carol = evaluate(&flag, &Context::from_json(&json!({"user_id": "carol"})));
        assert!(!carol.enabled);
        assert_eq!(carol.reason, Reason::PercentageRollout);
    }

    #[test]
    fn test_percentage_monotonicity() {
        // Every subject enabled at p stays enabled at any p' >= p.
        let make = |percentage| FlagSnapshot {
            project_id: Uuid::nil(),
            key: "rollout".to_string(),
            kind: FlagKind::Percentage,
            environment: "production".to_string(),
            overlay: Some(OverlaySnapshot {
                enabled: true,
                percentage,
                default_variant: None,
                rules: vec![],
            }),
            variants: vec![],
        };
        let low = make(30);
        let high = make(60);
        for i in 0..1000 {
            let ctx = Context::from_json(&json!({"user_id": format!("user-{}", i)}));
            if evaluate(&low, &ctx).enabled {
                assert!(evaluate(&high, &ctx).enabled);
            }
        }
    }

    #[test]
    fn test_variant_assignment_fixture() {
        let flag = FlagSnapshot {
            project_id: Uuid::nil(),
            key: "checkout".to_string(),
            kind: FlagKind::Variant,
            environment: "production".to_string(),
            overlay: Some(OverlaySnapshot {
                enabled: true,
                percentage: 0,
                default_variant: None,
                rules: vec![],
            }),
            variants: vec![
                VariantSnapshot {
                    key: "a".to_string(),
                    weight: 1,
                    payload: json!({"cta": "Buy now"}),
                },
                VariantSnapshot {
                    key: "b".to_string(),
                    weight: 3,
                    payload: serde_json::Value::Null,
                },
            ],
        };

        // bucket("checkout:variant", "bob") = 19 -> a (cumulative 25).
        let bob = evaluate(&flag, &Context::from_json(&json!({"user_id": "bob"})));
        assert!(bob.enabled);
        assert_eq!(bob.variant.as_deref(), Some("a"));
        assert_eq!(bob.reason, Reason::VariantAssignment);
        assert_eq!(bob.payload, Some(json!({"cta": "Buy now"})));

        // bucket("checkout:variant", "c") = 83 -> b.
        let c = evaluate(&flag, &Context::from_json(&json!({"user_id": "c"})));
        assert_eq!(c.variant.as_deref(), Some("b"));
        assert_eq!(c.payload, None);
    }

    #[test]
    fn test_segment_flag_serves_only_via_rules() {
        let flag = FlagSnapshot {
            project_id: Uuid::nil(),
            key: "checkout".to_string(),
            kind: FlagKind::Segment,
            environment: "production".to_string(),
            overlay: Some(OverlaySnapshot {
                enabled: true,
                percentage: 0,
                default_variant: None,
                rules: vec![RuleSnapshot {
                    id: Uuid::from_u128(2),
                    kind: RuleKind::Segment {
                        segment: SegmentSnapshot {
                            key: "paying".to_string(),
                            match_type: MatchType::Any,
                            rules: vec![SegmentRuleSnapshot {
                                attribute: "plan".to_string(),
                                operator: Operator::In,
                                value: "pro,enterprise".to_string(),
                            }],
                        },
                    },
                    serve_enabled: true,
                    serve_variant: None,
                    serve_percentage: None,
                }],
            }),
            variants: vec![],
        };

        let pro = evaluate(&flag, &Context::from_json(&json!({"plan": "pro", "user_id": "u1"})));
        assert!(pro.enabled);
        assert_eq!(pro.reason, Reason::RuleMatch);

        let free = evaluate(&flag, &Context::from_json(&json!({"plan": "free", "user_id": "u1"})));
        assert!(!free.enabled);
        assert_eq!(free.reason, Reason::NoSegmentMatch);
        assert_eq!(free.reason.to_string(), "no_segment_match");
    }

    #[test]
    fn test_rule_percentage_reason_carries_rule_id() {
        let rule = RuleSnapshot {
            id: Uuid::from_u128(0xabc),
            kind: RuleKind::UserId {
                user_ids: vec!["alice".to_string()],
            },
            serve_enabled: false,
            serve_variant: None,
            serve_percentage: Some(50),
        };
        let flag = boolean_flag(true, vec![rule]);
        let decision = evaluate(&flag, &Context::from_json(&json!({"user_id": "alice"})));
        assert_eq!(
            decision.reason,
            Reason::RulePercentage(Uuid::from_u128(0xabc))
        );
        assert_eq!(
            decision.reason.to_string(),
            format!("rule_percentage_{}", Uuid::from_u128(0xabc))
        );
    }

    #[test]
    fn test_evaluation_is_deterministic_with_stable_subject() {
        let flag = boolean_flag(true, vec![user_id_rule(1, &["u42"], true)]);
        let ctx = Context::from_json(&json!({"user_id": "u42", "plan": "pro"}));
        let first = evaluate(&flag, &ctx);
        for _ in 0..10 {
            assert_eq!(evaluate(&flag, &ctx), first);
        }
    }

    #[test]
    fn test_random_subject_fallback_still_decides() {
        let flag = FlagSnapshot {
            project_id: Uuid::nil(),
            key: "rollout".to_string(),
            kind: FlagKind::Percentage,
            environment: "production".to_string(),
            overlay: Some(OverlaySnapshot {
                enabled: true,
                percentage: 100,
                default_variant: None,
                rules: vec![],
            }),
            variants: vec![],
        };
        // No stable id in context: the decision still lands (full rollout
        // means always enabled regardless of the random bucket).
        let decision = evaluate(&flag, &Context::new());
        assert!(decision.enabled);
        assert!(decision.subject_id.is_some());
    }
}
