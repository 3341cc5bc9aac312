//! Segment matching

use crate::context::Context;
use crate::snapshot::{MatchType, SegmentSnapshot};

impl SegmentSnapshot {
    /// Evaluate the segment's rule set against a context.
    ///
    /// `all` is the conjunction, `any` the disjunction. An empty rule set
    /// matches nothing.
    pub fn matches(&self, context: &Context) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        match self.match_type {
            MatchType::All => self
                .rules
                .iter()
                .all(|rule| rule.operator.apply(context.get(&rule.attribute), &rule.value)),
            MatchType::Any => self
                .rules
                .iter()
                .any(|rule| rule.operator.apply(context.get(&rule.attribute), &rule.value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::Operator;
    use crate::snapshot::SegmentRuleSnapshot;
    use serde_json::json;

    fn segment(match_type: MatchType, rules: Vec<(&str, Operator, &str)>) -> SegmentSnapshot {
        SegmentSnapshot {
            key: "test".to_string(),
            match_type,
            rules: rules
                .into_iter()
                .map(|(attribute, operator, value)| SegmentRuleSnapshot {
                    attribute: attribute.to_string(),
                    operator,
                    value: value.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_all_requires_every_rule() {
        let seg = segment(
            MatchType::All,
            vec![("plan", Operator::Eq, "pro"), ("region", Operator::Eq, "eu")],
        );
        assert!(seg.matches(&Context::from_json(&json!({"plan": "pro", "region": "eu"}))));
        assert!(!seg.matches(&Context::from_json(&json!({"plan": "pro", "region": "us"}))));
    }

    #[test]
    fn test_any_requires_one_rule() {
        let seg = segment(
            MatchType::Any,
            vec![("plan", Operator::Eq, "pro"), ("region", Operator::Eq, "eu")],
        );
        assert!(seg.matches(&Context::from_json(&json!({"plan": "free", "region": "eu"}))));
        assert!(!seg.matches(&Context::from_json(&json!({"plan": "free", "region": "us"}))));
    }

    #[test]
    fn test_empty_rule_set_matches_nothing() {
        let seg = segment(MatchType::All, vec![]);
        assert!(!seg.matches(&Context::from_json(&json!({"plan": "pro"}))));
        let seg = segment(MatchType::Any, vec![]);
        assert!(!seg.matches(&Context::from_json(&json!({"plan": "pro"}))));
    }

    #[test]
    fn test_missing_attribute_fails_rule() {
        let seg = segment(MatchType::All, vec![("plan", Operator::Eq, "pro")]);
        assert!(!seg.matches(&Context::new()));
    }
}
