//! Strategy parameter normalization
//!
//! The discovery service has stored `strategy_params` in several shapes over
//! time: a JSON object, a JSON-encoded string of that object, an object
//! wrapped under its type tag (`{"macd": {"fast": 12}}`), or the internally
//! tagged form (`{"type": "macd", "fast": 12}`). Decimal-typed values come
//! through as strings (`"0.98"`). Everything is flattened into a [`ParamSet`]
//! of numeric values; non-numeric entries are dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Flat, ordered map of parameter key to numeric value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamSet(BTreeMap<String, f64>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedParams {
    #[error("not valid JSON: {0}")]
    Json(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Parse raw `strategy_params` text. Total: unparseable text is `{}`.
    pub fn parse(text: &str) -> Self {
        normalize(&Value::String(text.to_string()))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ParamSet {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Normalize any accepted `strategy_params` shape. Never fails; a malformed
/// payload degrades to an empty set.
pub fn normalize(value: &Value) -> ParamSet {
    try_normalize(value).unwrap_or_else(|e| {
        debug!(error = %e, "strategy_params malformed, using empty parameter set");
        ParamSet::default()
    })
}

/// Like [`normalize`] but reports why a payload was rejected
pub fn try_normalize(value: &Value) -> Result<ParamSet, MalformedParams> {
    match value {
        Value::Null => Ok(ParamSet::default()),
        Value::Object(map) => Ok(flatten(map)),
        Value::String(text) => {
            let inner: Value =
                serde_json::from_str(text).map_err(|e| MalformedParams::Json(e.to_string()))?;
            match inner {
                Value::Object(map) => Ok(flatten(&map)),
                // A JSON string holding a JSON string: one more decode
                Value::String(_) => try_normalize(&inner),
                other => Err(MalformedParams::NotAnObject(json_kind(&other))),
            }
        }
        other => Err(MalformedParams::NotAnObject(json_kind(other))),
    }
}

fn flatten(map: &Map<String, Value>) -> ParamSet {
    // `{"<tag>": {...}}`: a single entry wrapping the real parameter object
    if map.len() == 1 {
        if let Some((_, Value::Object(inner))) = map.iter().next() {
            return flatten(inner);
        }
    }

    map.iter()
        .filter_map(|(key, value)| numeric(value).map(|n| (key.clone(), n)))
        .collect()
}

fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwraps_tag_wrapper() {
        let params = normalize(&json!({"macd": {"fast": 12, "slow": 26}}));
        let expected: ParamSet = [("fast", 12.0), ("slow", 26.0)].into_iter().collect();
        assert_eq!(params, expected);
    }

    #[test]
    fn test_flat_object_unchanged() {
        let params = normalize(&json!({"fast": 12}));
        assert_eq!(params.get("fast"), Some(12.0));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_invalid_text_is_empty() {
        assert!(ParamSet::parse("{not json").is_empty());
        assert!(ParamSet::parse("[1, 2, 3]").is_empty());
        assert!(ParamSet::parse("").is_empty());
        assert!(matches!(
            try_normalize(&Value::String("{oops".into())),
            Err(MalformedParams::Json(_))
        ));
        assert_eq!(
            try_normalize(&json!(42)),
            Err(MalformedParams::NotAnObject("a number"))
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize(&json!({"rsi": {"period": 14, "overbought": 70.0}}));
        let encoded = serde_json::to_value(&once).unwrap();
        let twice = normalize(&encoded);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_internally_tagged_form_with_decimal_strings() {
        let text = r#"{"type":"gabagool","max_pair_cost":"0.98","bid_offset":"0.01","spread_multiplier":"3"}"#;
        let params = ParamSet::parse(text);
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("max_pair_cost"), Some(0.98));
        assert_eq!(params.get("spread_multiplier"), Some(3.0));
        assert_eq!(params.get("type"), None);
    }

    #[test]
    fn test_double_encoded_string() {
        let inner = r#"{"period": 20}"#;
        let outer = serde_json::to_string(inner).unwrap();
        let params = ParamSet::parse(&outer);
        assert_eq!(params.get("period"), Some(20.0));
    }

    #[test]
    fn test_null_is_empty_not_malformed() {
        assert_eq!(try_normalize(&Value::Null), Ok(ParamSet::default()));
    }

    #[test]
    fn test_non_numeric_entries_dropped() {
        let params = normalize(&json!({"period": 14, "label": "fast", "on": true, "arr": [1]}));
        assert_eq!(params.len(), 1);
    }
}
