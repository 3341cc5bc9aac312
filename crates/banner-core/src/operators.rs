//! Operator library
//!
//! Attribute-vs-literal predicates used by flag rules and segment rules.
//! Every operator folds exceptional input (missing attribute, non-numeric
//! operand, malformed pattern) to `false`; no operator ever raises. A
//! missing attribute is `false` even for the negated operators —
//! missingness is not inequality.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::Value;

/// The twelve rule operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Neq,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Regex,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Regex => "regex",
        }
    }

    pub fn parse(s: &str) -> Option<Operator> {
        match s {
            "eq" => Some(Operator::Eq),
            "neq" => Some(Operator::Neq),
            "contains" => Some(Operator::Contains),
            "not_contains" => Some(Operator::NotContains),
            "starts_with" => Some(Operator::StartsWith),
            "ends_with" => Some(Operator::EndsWith),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "in" => Some(Operator::In),
            "not_in" => Some(Operator::NotIn),
            "regex" => Some(Operator::Regex),
            _ => None,
        }
    }

    /// Apply the operator to an attribute value and a literal.
    pub fn apply(&self, attribute: Option<&Value>, literal: &str) -> bool {
        self.try_apply(attribute, literal).unwrap_or(false)
    }

    /// `None` when the operator cannot be applied; the caller folds that to
    /// `false`.
    fn try_apply(&self, attribute: Option<&Value>, literal: &str) -> Option<bool> {
        let attribute = attribute?;

        match self {
            Operator::Eq => Some(attribute.coerce_string() == literal),
            Operator::Neq => Some(attribute.coerce_string() != literal),

            Operator::Contains => Some(attribute.coerce_string().contains(literal)),
            Operator::NotContains => Some(!attribute.coerce_string().contains(literal)),

            Operator::StartsWith => Some(attribute.coerce_string().starts_with(literal)),
            Operator::EndsWith => Some(attribute.coerce_string().ends_with(literal)),

            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let lhs = attribute.coerce_number()?;
                let rhs: f64 = literal.trim().parse().ok()?;
                Some(match self {
                    Operator::Gt => lhs > rhs,
                    Operator::Gte => lhs >= rhs,
                    Operator::Lt => lhs < rhs,
                    Operator::Lte => lhs <= rhs,
                    _ => unreachable!(),
                })
            }

            Operator::In | Operator::NotIn => {
                let needle = attribute.coerce_string();
                let found = literal.split(',').any(|item| item.trim() == needle);
                Some(if *self == Operator::In { found } else { !found })
            }

            Operator::Regex => {
                let regex = Regex::new(literal).ok()?;
                Some(regex.is_match(&attribute.coerce_string()))
            }
        }
    }
}
