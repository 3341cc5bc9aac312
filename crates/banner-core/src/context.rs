//! Subject context model
//!
//! Decision requests carry an arbitrary JSON attribute bag. It is normalized
//! at the edge into a flat `map<string, Value>` where `Value` is a small
//! tagged union; rule evaluation only ever sees the normalized form.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A normalized attribute value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

impl Value {
    /// String form used by string-shaped operators and set membership.
    ///
    /// Whole numbers render without a decimal point so `42` in a JSON
    /// context compares equal to the literal `"42"`.
    pub fn coerce_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::List(items) => items.join(","),
        }
    }

    /// Numeric form used by comparison operators. `None` when the value does
    /// not parse as a number.
    pub fn coerce_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(_) | Value::List(_) => None,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Normalized subject context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    attributes: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from raw request JSON.
    ///
    /// Normalization rules:
    /// - scalar values become `String`/`Number`/`Bool`
    /// - arrays keep their scalar elements, coerced to strings
    /// - a `user` sub-object is flattened into the top level and the `user`
    ///   key removed; top-level keys win over flattened ones
    /// - `null` and any other nested structure are dropped
    ///
    /// Key access after normalization is case-sensitive.
    pub fn from_json(raw: &serde_json::Value) -> Self {
        let mut attributes = HashMap::new();

        let serde_json::Value::Object(map) = raw else {
            return Self { attributes };
        };

        if let Some(serde_json::Value::Object(user)) = map.get("user") {
            for (key, value) in user {
                if let Some(v) = normalize_value(value) {
                    attributes.insert(key.clone(), v);
                }
            }
        }

        for (key, value) in map {
            if key == "user" {
                continue;
            }
            if let Some(v) = normalize_value(value) {
                attributes.insert(key.clone(), v);
            }
        }

        Self { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Resolve the subject identifier: `user_id`, then `id`, then
    /// `anonymous_id`. `None` means the caller supplied no stable identity.
    pub fn subject_id(&self) -> Option<String> {
        ["user_id", "id", "anonymous_id"]
            .iter()
            .find_map(|key| self.attributes.get(*key))
            .map(Value::coerce_string)
    }
}

fn normalize_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Number(n) => n.as_f64().map(Value::Number),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Array(items) => Some(Value::List(
            items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => {
                        n.as_f64().map(|f| Value::Number(f).coerce_string())
                    }
                    serde_json::Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect(),
        )),
        serde_json::Value::Null | serde_json::Value::Object(_) => None,
    }
}
