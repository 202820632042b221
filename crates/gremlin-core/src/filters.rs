//! Request filter normalization.
//!
//! Neutron sends filters as `name → [values]`, but some clients wrap a group
//! of filters in an extra object. Decoding promotes the inner keys of such
//! objects to the top level (one level only) and drops anything else with a
//! warning. A malformed filter never fails the request decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A raw filter value, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// `name: [v1, v2]`
    List(Vec<Value>),
    /// `wrapper: {name: [v1, v2], ...}`
    Nested(BTreeMap<String, Vec<Value>>),
}

impl FilterValue {
    /// Classify a raw JSON value. Returns `None` for shapes that are neither
    /// a list nor a map; those filters are dropped by the caller.
    ///
    /// Inner entries of a map that are not lists are dropped here.
    pub fn classify(name: &str, raw: Value) -> Option<Self> {
        match raw {
            Value::Array(values) => Some(Self::List(values)),
            Value::Object(inner) => {
                let mut nested = BTreeMap::new();
                for (key, value) in inner {
                    match value {
                        Value::Array(values) => {
                            nested.insert(key, values);
                        }
                        other => {
                            tracing::warn!(
                                filter = %name,
                                key = %key,
                                value = %other,
                                "Can't handle nested filter"
                            );
                        }
                    }
                }
                Some(Self::Nested(nested))
            }
            _ => None,
        }
    }
}

/// Normalized request filters: name → list of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filters(BTreeMap<String, Vec<Value>>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw filter object.
    ///
    /// Top-level lists take precedence over keys promoted from a nested map.
    pub fn normalize(raw: serde_json::Map<String, Value>) -> Self {
        let mut promoted = BTreeMap::new();
        let mut lists = BTreeMap::new();

        for (name, value) in raw {
            let shown = value.to_string();
            match FilterValue::classify(&name, value) {
                Some(FilterValue::List(values)) => {
                    lists.insert(name, values);
                }
                Some(FilterValue::Nested(inner)) => promoted.extend(inner),
                None => {
                    tracing::warn!(
                        filter = %name,
                        value = %shown,
                        "Can't handle filter, dropping it"
                    );
                }
            }
        }

        promoted.extend(lists);
        Self(promoted)
    }

    /// Normalize any JSON value. Non-object values yield no filters.
    pub fn from_value(raw: Value) -> Self {
        match raw {
            Value::Object(map) => Self::normalize(map),
            Value::Null => Self::default(),
            other => {
                tracing::warn!(value = %other, "Filters are not an object, ignoring them");
                Self::default()
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.0.insert(name.into(), values);
    }

    /// Filters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Filters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_value(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(raw: Value) -> Filters {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_nested_map_is_flattened_once() {
        let filters = decode(json!({"a": {"b": [1, 2]}}));
        assert_eq!(filters.len(), 1);
        assert_eq!(filters.get("b"), Some(&[json!(1), json!(2)][..]));
        assert_eq!(filters.get("a"), None);
    }

    #[test]
    fn test_list_passes_through() {
        let filters = decode(json!({"a": [1, 2]}));
        assert_eq!(filters.get("a"), Some(&[json!(1), json!(2)][..]));
    }

    #[test]
    fn test_scalar_is_dropped() {
        let filters = decode(json!({"a": "x"}));
        assert!(filters.is_empty());
    }

    #[test]
    fn test_classify_rejects_scalars() {
        assert_eq!(FilterValue::classify("a", json!("x")), None);
        assert_eq!(FilterValue::classify("a", json!(1)), None);
        assert_eq!(FilterValue::classify("a", json!(true)), None);
        assert_eq!(FilterValue::classify("a", Value::Null), None);
    }

    #[test]
    fn test_only_one_level_is_flattened() {
        let filters = decode(json!({"a": {"b": {"c": [1]}, "d": ["x"]}}));
        assert_eq!(filters.get("c"), None);
        assert_eq!(filters.get("b"), None);
        assert_eq!(filters.get("d"), Some(&[json!("x")][..]));
    }

    #[test]
    fn test_top_level_list_wins_over_promoted_key() {
        let filters = decode(json!({"b": ["top"], "wrap": {"b": ["inner"]}}));
        assert_eq!(filters.get("b"), Some(&[json!("top")][..]));
    }

    #[test]
    fn test_non_object_filters_are_empty() {
        assert!(decode(json!(null)).is_empty());
        assert!(decode(json!(["a"])).is_empty());
        assert!(decode(json!("name")).is_empty());
    }

    #[test]
    fn test_iteration_is_sorted() {
        let filters = decode(json!({"z": [1], "a": [2], "m": {"k": [3]}}));
        let names: Vec<&str> = filters.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "k", "z"]);
    }
}
