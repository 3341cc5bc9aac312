//! Wire models for the HTTP surface

use banner_core::{Decision, FlagSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// === Decision surfaces ===

#[derive(Debug, Deserialize)]
pub struct DecisionQuery {
    pub environment: String,
    /// JSON-encoded context attribute bag
    pub context: Option<String>,
    /// Record the decision in the evaluation log; defaults to on
    pub log: Option<bool>,
}

/// `{key, enabled, variant, reason}` — HTTP 200 even for
/// `flag_not_found` and `flag_disabled`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub key: String,
    pub enabled: bool,
    pub variant: Option<String>,
    pub reason: String,
}

impl DecisionResponse {
    pub fn from_decision(key: &str, decision: &Decision) -> Self {
        Self {
            key: key.to_string(),
            enabled: decision.enabled,
            variant: decision.variant.clone(),
            reason: decision.reason.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkEvaluationParam {
    pub environment: String,
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct BulkFlagDecision {
    pub key: String,
    pub enabled: bool,
    pub variant: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkEvaluationResponse {
    pub flags: Vec<BulkFlagDecision>,
}

// === SDK surfaces ===

#[derive(Debug, Deserialize)]
pub struct BootstrapQuery {
    pub environment: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapResponse {
    pub flags: Vec<FlagSnapshot>,
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SdkEvaluateParam {
    pub flag: String,
    pub environment: String,
    pub context: Option<serde_json::Value>,
    pub log: Option<bool>,
}

// === Admin: flags ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagListQuery {
    #[serde(default = "default_page_no")]
    pub page_no: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default)]
    pub include_archived: bool,
}

fn default_page_no() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagCreateParam {
    pub key: String,
    pub name: String,
    pub description: Option<String>,
    /// boolean, percentage, variant, segment
    pub kind: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub permanent: bool,
    pub owner_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagUpdateParam {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub permanent: Option<bool>,
    pub owner_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantParam {
    pub key: String,
    pub name: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub weight: i32,
}

#[derive(Debug, Deserialize)]
pub struct VariantsPutParam {
    pub variants: Vec<VariantParam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleParam {
    /// segment, attribute, user_id
    pub rule_type: String,
    pub segment: Option<String>,
    pub attribute: Option<String>,
    pub operator: Option<String>,
    pub value: Option<String>,
    pub user_ids: Option<Vec<String>>,
    #[serde(default)]
    pub serve_enabled: bool,
    pub serve_variant: Option<String>,
    pub serve_percentage: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RulesPutParam {
    pub rules: Vec<RuleParam>,
}

#[derive(Debug, Deserialize)]
pub struct TogglePutParam {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SchedulePutParam {
    /// enable or disable
    pub kind: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPutParam {
    pub percentage: Option<i32>,
    pub default_variant: Option<String>,
}

// === Admin: segments ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRuleParam {
    pub attribute: String,
    pub operator: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentCreateParam {
    pub key: String,
    pub name: String,
    /// all or any
    pub match_type: String,
    #[serde(default)]
    pub rules: Vec<SegmentRuleParam>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentUpdateParam {
    pub name: Option<String>,
    pub match_type: Option<String>,
    pub rules: Option<Vec<SegmentRuleParam>>,
}

// === Admin: environments ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentCreateParam {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub production_flag: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use banner_core::Reason;

    #[test]
    fn test_decision_response_wire_shape() {
        let decision = Decision {
            enabled: true,
            variant: Some("a".to_string()),
            payload: None,
            reason: Reason::VariantAssignment,
            rule_id: None,
            subject_id: Some("u1".to_string()),
        };
        let response = DecisionResponse::from_decision("checkout", &decision);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["key"], "checkout");
        assert_eq!(json["enabled"], true);
        assert_eq!(json["variant"], "a");
        assert_eq!(json["reason"], "variant_assignment");
        // The wire shape is exactly these four fields.
        assert_eq!(json.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_flag_create_param_camel_case() {
        let param: FlagCreateParam = serde_json::from_str(
            r#"{"key": "checkout", "name": "Checkout", "kind": "boolean", "ownerEmail": "a@b.c"}"#,
        )
        .unwrap();
        assert_eq!(param.owner_email.as_deref(), Some("a@b.c"));
        assert!(!param.permanent);
        assert!(param.tags.is_empty());
    }

    #[test]
    fn test_rule_param_defaults() {
        let param: RuleParam =
            serde_json::from_str(r#"{"ruleType": "user_id", "userIds": ["u1"]}"#).unwrap();
        assert_eq!(param.rule_type, "user_id");
        assert_eq!(param.user_ids.as_deref(), Some(&["u1".to_string()][..]));
        assert!(!param.serve_enabled);
    }
}
