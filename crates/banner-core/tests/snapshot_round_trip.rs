// A snapshot serialized to the cache and deserialized back must evaluate
// byte-identical decisions to the original.

use banner_core::{
    evaluate, Context, FlagKind, FlagSnapshot, MatchType, Operator, OverlaySnapshot, RuleKind,
    RuleSnapshot, SegmentRuleSnapshot, SegmentSnapshot, VariantSnapshot,
};
use serde_json::json;
use uuid::Uuid;

fn rich_snapshot() -> FlagSnapshot {
    FlagSnapshot {
        project_id: Uuid::from_u128(11),
        key: "checkout".to_string(),
        kind: FlagKind::Variant,
        environment: "production".to_string(),
        overlay: Some(OverlaySnapshot {
            enabled: true,
            percentage: 40,
            default_variant: Some("control".to_string()),
            rules: vec![
                RuleSnapshot {
                    id: Uuid::from_u128(1),
                    kind: RuleKind::UserId {
                        user_ids: vec!["vip-1".to_string()],
                    },
                    serve_enabled: true,
                    serve_variant: Some("treatment".to_string()),
                    serve_percentage: None,
                },
                RuleSnapshot {
                    id: Uuid::from_u128(2),
                    kind: RuleKind::Segment {
                        segment: SegmentSnapshot {
                            key: "paying".to_string(),
                            match_type: MatchType::All,
                            rules: vec![
                                SegmentRuleSnapshot {
                                    attribute: "plan".to_string(),
                                    operator: Operator::In,
                                    value: "pro,enterprise".to_string(),
                                },
                                SegmentRuleSnapshot {
                                    attribute: "seats".to_string(),
                                    operator: Operator::Gte,
                                    value: "5".to_string(),
                                },
                            ],
                        },
                    },
                    serve_enabled: false,
                    serve_variant: None,
                    serve_percentage: Some(25),
                },
                RuleSnapshot {
                    id: Uuid::from_u128(3),
                    kind: RuleKind::Attribute {
                        attribute: "region".to_string(),
                        operator: Operator::StartsWith,
                        value: "eu-".to_string(),
                    },
                    serve_enabled: false,
                    serve_variant: None,
                    serve_percentage: None,
                },
            ],
        }),
        variants: vec![
            VariantSnapshot {
                key: "control".to_string(),
                weight: 1,
                payload: json!({"layout": "classic"}),
            },
            VariantSnapshot {
                key: "treatment".to_string(),
                weight: 3,
                payload: json!({"layout": "one_page"}),
            },
        ],
    }
}

#[test]
fn round_trip_preserves_every_decision() {
    let original = rich_snapshot();
    let encoded = serde_json::to_string(&original).unwrap();
    let restored: FlagSnapshot = serde_json::from_str(&encoded).unwrap();
    assert_eq!(original, restored);

    let contexts = [
        json!({"user_id": "vip-1"}),
        json!({"user_id": "u1", "plan": "pro", "seats": 9}),
        json!({"user_id": "u2", "plan": "pro", "seats": 2}),
        json!({"user_id": "u3", "region": "eu-west-1"}),
        json!({"user_id": "u4"}),
        json!({"id": "fallback-id"}),
        json!({"plan": "enterprise", "seats": 100, "user_id": "big-co"}),
    ];

    for raw in &contexts {
        let ctx = Context::from_json(raw);
        assert_eq!(
            evaluate(&original, &ctx),
            evaluate(&restored, &ctx),
            "context {:?} diverged after round trip",
            raw
        );
    }
}

#[test]
fn round_trip_preserves_missing_overlay() {
    let mut snapshot = rich_snapshot();
    snapshot.overlay = None;
    let encoded = serde_json::to_string(&snapshot).unwrap();
    let restored: FlagSnapshot = serde_json::from_str(&encoded).unwrap();
    let decision = evaluate(&restored, &Context::new());
    assert!(!decision.enabled);
    assert_eq!(decision.reason.to_string(), "flag_not_found");
}
