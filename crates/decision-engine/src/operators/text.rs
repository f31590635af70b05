//! 字符串聚合操作符：join / length

use super::OperatorFamily;
use super::params::{Comparator, as_number};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct TextAggregationOperators;

const DEFAULT_SEPARATOR: &str = ",";

impl OperatorFamily for TextAggregationOperators {
    fn name(&self) -> &'static str {
        "string_aggregation"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["join", "length"]
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        _session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        let matched = match operator {
            "join" => join(actual, expected),
            "length" => length(actual).is_some_and(|len| compare_length(len, expected)),
            _ => return None,
        };
        Some(matched)
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn join(actual: &Value, expected: &Value) -> bool {
    let Some(items) = actual.as_array() else {
        return false;
    };
    let joined_with =
        |separator: &str| items.iter().map(display).collect::<Vec<_>>().join(separator);

    match expected {
        Value::String(target) => joined_with(DEFAULT_SEPARATOR) == *target,
        Value::Object(map) => {
            let separator = map
                .get("separator")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_SEPARATOR);
            let joined = joined_with(separator);
            match (map.get("equals"), map.get("contains")) {
                (Some(Value::String(target)), _) => joined == *target,
                (None, Some(Value::String(fragment))) => joined.contains(fragment.as_str()),
                _ => false,
            }
        }
        _ => false,
    }
}

fn length(actual: &Value) -> Option<usize> {
    match actual {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn compare_length(len: usize, expected: &Value) -> bool {
    let len = len as f64;
    match expected {
        Value::Number(_) => as_number(expected) == Some(len),
        Value::Object(map) => Comparator::from_map(map).is_some_and(|c| c.matches(len)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EngineCaches;
    use crate::context::Context;
    use serde_json::json;

    fn eval(op: &str, actual: Value, expected: Value) -> bool {
        let ctx = Context::default();
        let caches = EngineCaches::default();
        let mut session = EvaluationSession::new(&ctx, &caches);
        TextAggregationOperators
            .evaluate(op, &actual, &expected, &mut session)
            .unwrap()
    }

    #[test]
    fn test_join() {
        let tags = json!(["gold", "vip", 3]);
        assert!(eval("join", tags.clone(), json!("gold,vip,3")));
        assert!(eval("join", tags.clone(), json!({"separator": " | ", "equals": "gold | vip | 3"})));
        assert!(eval("join", tags.clone(), json!({"separator": "-", "contains": "vip-3"})));
        assert!(!eval("join", tags, json!({"separator": "-"})));
        assert!(!eval("join", json!("gold"), json!("gold")));
    }

    #[test]
    fn test_length() {
        assert!(eval("length", json!("héllo"), json!(5)));
        assert!(eval("length", json!([1, 2, 3]), json!({"gte": 3})));
        assert!(eval("length", json!({"a": 1}), json!(1)));
        assert!(!eval("length", json!(12345), json!(5)));
        assert!(!eval("length", json!("abc"), json!("3")));
    }
}
