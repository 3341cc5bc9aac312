//! Ordered rule walk
//!
//! Rules are evaluated in position order; the first matching rule produces
//! a decision and nothing after it contributes. No match is a *pass*,
//! distinct from a false decision — the evaluator then applies the
//! flag-type default.

use uuid::Uuid;

use crate::context::{Context, Value};
use crate::hasher::bucket;
use crate::snapshot::{FlagKind, RuleKind, RuleSnapshot};

/// Outcome of a matched rule.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleDecision {
    pub rule_id: Uuid,
    pub enabled: bool,
    pub variant: Option<String>,
    /// Set when the rule served a percentage split rather than a fixed
    /// outcome; drives the `rule_percentage_<id>` reason code.
    pub percentage_serve: bool,
}

impl RuleSnapshot {
    fn matches(&self, context: &Context) -> bool {
        match &self.kind {
            RuleKind::Segment { segment } => segment.matches(context),
            RuleKind::Attribute {
                attribute,
                operator,
                value,
            } => operator.apply(context.get(attribute), value),
            RuleKind::UserId { user_ids } => {
                let user_id = context.get("user_id").map(Value::coerce_string);
                match user_id {
                    Some(id) => user_ids.iter().any(|candidate| candidate == &id),
                    None => false,
                }
            }
        }
    }

    /// Produce the decision for a matched rule, honoring serve precedence:
    /// variant serve (variant flags only), then percentage serve, then the
    /// plain enabled bit.
    fn decide(&self, flag_kind: FlagKind, flag_key: &str, subject: &str) -> RuleDecision {
        if flag_kind == FlagKind::Variant
            && let Some(variant) = &self.serve_variant
        {
            return RuleDecision {
                rule_id: self.id,
                enabled: true,
                variant: Some(variant.clone()),
                percentage_serve: false,
            };
        }

        if let Some(percentage) = self.serve_percentage {
            let b = bucket(flag_key, subject);
            return RuleDecision {
                rule_id: self.id,
                enabled: b < percentage,
                variant: None,
                percentage_serve: true,
            };
        }

        RuleDecision {
            rule_id: self.id,
            enabled: self.serve_enabled,
            variant: None,
            percentage_serve: false,
        }
    }
}

/// Walk `rules` in order and return the first match's decision, or `None`
/// when every rule passes.
pub fn walk(
    rules: &[RuleSnapshot],
    flag_kind: FlagKind,
    flag_key: &str,
    context: &Context,
    subject: &str,
) -> Option<RuleDecision> {
    rules
        .iter()
        .find(|rule| rule.matches(context))
        .map(|rule| rule.decide(flag_kind, flag_key, subject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;
    use crate::snapshot::{MatchType, SegmentRuleSnapshot, SegmentSnapshot};
    use serde_json::json;

    fn attribute_rule(id: u128, attribute: &str, value: &str, serve_enabled: bool) -> RuleSnapshot {
        RuleSnapshot {
            id: Uuid::from_u128(id),
            kind: RuleKind::Attribute {
                attribute: attribute.to_string(),
                operator: Operator::Eq,
                value: value.to_string(),
            },
            serve_enabled,
            serve_variant: None,
            serve_percentage: None,
        }
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            attribute_rule(1, "plan", "pro", true),
            attribute_rule(2, "plan", "pro", false),
        ];
        let ctx = Context::from_json(&json!({"plan": "pro"}));
        let decision = walk(&rules, FlagKind::Boolean, "checkout", &ctx, "u1").unwrap();
        assert_eq!(decision.rule_id, Uuid::from_u128(1));
        assert!(decision.enabled);
    }

    #[test]
    fn test_no_match_is_pass() {
        let rules = vec![attribute_rule(1, "plan", "pro", true)];
        let ctx = Context::from_json(&json!({"plan": "free"}));
        assert!(walk(&rules, FlagKind::Boolean, "checkout", &ctx, "u1").is_none());
    }

    #[test]
    fn test_user_id_rule() {
        let rule = RuleSnapshot {
            id: Uuid::from_u128(7),
            kind: RuleKind::UserId {
                user_ids: vec!["u42".to_string(), "u99".to_string()],
            },
            serve_enabled: true,
            serve_variant: None,
            serve_percentage: None,
        };
        let hit = Context::from_json(&json!({"user_id": "u42"}));
        let miss = Context::from_json(&json!({"user_id": "u43"}));
        let anon = Context::from_json(&json!({"anonymous_id": "u42"}));
        assert!(walk(&[rule.clone()], FlagKind::Boolean, "f", &hit, "u42").is_some());
        assert!(walk(&[rule.clone()], FlagKind::Boolean, "f", &miss, "u43").is_none());
        // user_id rules match the user_id attribute, not the resolved subject.
        assert!(walk(&[rule], FlagKind::Boolean, "f", &anon, "u42").is_none());
    }

    #[test]
    fn test_segment_rule() {
        let rule = RuleSnapshot {
            id: Uuid::from_u128(3),
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
        };
        let hit = Context::from_json(&json!({"plan": "enterprise"}));
        let miss = Context::from_json(&json!({"plan": "free"}));
        assert!(walk(&[rule.clone()], FlagKind::Segment, "f", &hit, "s").is_some());
        assert!(walk(&[rule], FlagKind::Segment, "f", &miss, "s").is_none());
    }

    #[test]
    fn test_serve_variant_takes_precedence_on_variant_flags() {
        let rule = RuleSnapshot {
            id: Uuid::from_u128(5),
            kind: RuleKind::Attribute {
                attribute: "plan".to_string(),
                operator: Operator::Eq,
                value: "pro".to_string(),
            },
            serve_enabled: false,
            serve_variant: Some("treatment".to_string()),
            serve_percentage: Some(0),
        };
        let ctx = Context::from_json(&json!({"plan": "pro"}));
        let decision = walk(&[rule], FlagKind::Variant, "f", &ctx, "u1").unwrap();
        assert!(decision.enabled);
        assert_eq!(decision.variant.as_deref(), Some("treatment"));
        assert!(!decision.percentage_serve);
    }

    #[test]
    fn test_serve_variant_ignored_on_non_variant_flags() {
        let rule = RuleSnapshot {
            id: Uuid::from_u128(5),
            kind: RuleKind::Attribute {
                attribute: "plan".to_string(),
                operator: Operator::Eq,
                value: "pro".to_string(),
            },
            serve_enabled: true,
            serve_variant: Some("treatment".to_string()),
            serve_percentage: None,
        };
        let ctx = Context::from_json(&json!({"plan": "pro"}));
        let decision = walk(&[rule], FlagKind::Boolean, "f", &ctx, "u1").unwrap();
        assert!(decision.enabled);
        assert!(decision.variant.is_none());
    }

    #[test]
    fn test_serve_percentage_buckets_on_flag_key() {
        let rule = RuleSnapshot {
            id: Uuid::from_u128(9),
            kind: RuleKind::Attribute {
                attribute: "plan".to_string(),
                operator: Operator::Eq,
                value: "pro".to_string(),
            },
            serve_enabled: false,
            serve_variant: None,
            serve_percentage: Some(50),
        };
        let ctx = Context::from_json(&json!({"plan": "pro"}));
        // bucket("checkout", "alice") = 6 < 50; bucket("checkout", "carol") = 95.
        let alice = walk(&[rule.clone()], FlagKind::Boolean, "checkout", &ctx, "alice").unwrap();
        assert!(alice.enabled);
        assert!(alice.percentage_serve);
        let carol = walk(&[rule], FlagKind::Boolean, "checkout", &ctx, "carol").unwrap();
        assert!(!carol.enabled);
        assert!(carol.percentage_serve);
    }
}
