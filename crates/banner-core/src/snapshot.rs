//! Self-contained flag snapshots
//!
//! A snapshot is the cached projection of one flag in one environment,
//! carrying everything evaluation needs: the flag type, the environment
//! overlay, the ordered variants, and the ordered rules with any referenced
//! segments resolved inline at build time. Snapshots serialize to the cache
//! and back without losing information, so a decision computed from a
//! cached snapshot is byte-identical to one computed from a fresh load.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::operators::Operator;

/// Flag type, driving the evaluator's default dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Boolean,
    Percentage,
    Variant,
    Segment,
}

impl FlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagKind::Boolean => "boolean",
            FlagKind::Percentage => "percentage",
            FlagKind::Variant => "variant",
            FlagKind::Segment => "segment",
        }
    }

    pub fn parse(s: &str) -> Option<FlagKind> {
        match s {
            "boolean" => Some(FlagKind::Boolean),
            "percentage" => Some(FlagKind::Percentage),
            "variant" => Some(FlagKind::Variant),
            "segment" => Some(FlagKind::Segment),
            _ => None,
        }
    }
}

/// How a segment combines its rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    All,
    Any,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::All => "all",
            MatchType::Any => "any",
        }
    }

    pub fn parse(s: &str) -> Option<MatchType> {
        match s {
            "all" => Some(MatchType::All),
            "any" => Some(MatchType::Any),
            _ => None,
        }
    }
}

/// One arm of a variant flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariantSnapshot {
    pub key: String,
    pub weight: u32,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A single predicate inside a segment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentRuleSnapshot {
    pub attribute: String,
    pub operator: Operator,
    pub value: String,
}

/// A segment resolved inline at snapshot build time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    pub key: String,
    pub match_type: MatchType,
    pub rules: Vec<SegmentRuleSnapshot>,
}

/// The discriminated predicate of a flag rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Segment { segment: SegmentSnapshot },
    Attribute {
        attribute: String,
        operator: Operator,
        value: String,
    },
    UserId { user_ids: Vec<String> },
}

/// An ordered targeting rule of a flag-environment overlay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: RuleKind,
    pub serve_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve_variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve_percentage: Option<u32>,
}

/// Per-environment overlay of a flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlaySnapshot {
    pub enabled: bool,
    pub percentage: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_variant: Option<String>,
    pub rules: Vec<RuleSnapshot>,
}

/// The cached, self-contained projection of one flag in one environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlagSnapshot {
    pub project_id: Uuid,
    pub key: String,
    pub kind: FlagKind,
    pub environment: String,
    /// `None` when the flag exists but has no overlay for the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlaySnapshot>,
    /// Ordered by position. Variants belong to the flag, not the overlay.
    pub variants: Vec<VariantSnapshot>,
}

impl FlagSnapshot {
    /// Look up a variant's payload by key.
    pub fn variant_payload(&self, key: &str) -> Option<&serde_json::Value> {
        self.variants
            .iter()
            .find(|v| v.key == key)
            .map(|v| &v.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> FlagSnapshot {
        FlagSnapshot {
            project_id: Uuid::nil(),
            key: "checkout".to_string(),
            kind: FlagKind::Variant,
            environment: "production".to_string(),
            overlay: Some(OverlaySnapshot {
                enabled: true,
                percentage: 50,
                default_variant: Some("control".to_string()),
                rules: vec![RuleSnapshot {
                    id: Uuid::nil(),
                    kind: RuleKind::Segment {
                        segment: SegmentSnapshot {
                            key: "beta_testers".to_string(),
                            match_type: MatchType::Any,
                            rules: vec![SegmentRuleSnapshot {
                                attribute: "plan".to_string(),
                                operator: Operator::In,
                                value: "pro,enterprise".to_string(),
                            }],
                        },
                    },
                    serve_enabled: true,
                    serve_variant: Some("treatment".to_string()),
                    serve_percentage: None,
                }],
            }),
            variants: vec![
                VariantSnapshot {
                    key: "control".to_string(),
                    weight: 1,
                    payload: serde_json::json!({"color": "blue"}),
                },
                VariantSnapshot {
                    key: "treatment".to_string(),
                    weight: 3,
                    payload: serde_json::Value::Null,
                },
            ],
        }
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snapshot = sample_snapshot();
        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: FlagSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn test_rule_kind_tagged_encoding() {
        let snapshot = sample_snapshot();
        let encoded = serde_json::to_value(&snapshot).unwrap();
        let rule = &encoded["overlay"]["rules"][0];
        assert_eq!(rule["type"], "segment");
        assert_eq!(rule["segment"]["key"], "beta_testers");
    }

    #[test]
    fn test_variant_payload_lookup() {
        let snapshot = sample_snapshot();
        assert_eq!(
            snapshot.variant_payload("control"),
            Some(&serde_json::json!({"color": "blue"}))
        );
        assert!(snapshot.variant_payload("missing").is_none());
    }

    #[test]
    fn test_kind_parse_round_trip() {
        for name in ["boolean", "percentage", "variant", "segment"] {
            assert_eq!(FlagKind::parse(name).unwrap().as_str(), name);
        }
        assert!(FlagKind::parse("toggle").is_none());
        for name in ["all", "any"] {
            assert_eq!(MatchType::parse(name).unwrap().as_str(), name);
        }
    }
}
