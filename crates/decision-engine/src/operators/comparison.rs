//! 比较操作符：eq / neq / gt / gte / lt / lte / in / present / blank

use super::{OperatorFamily, values_equal};
use crate::context::EvaluationSession;
use serde_json::Value;
use std::cmp::Ordering;

pub struct ComparisonOperators;

const OPERATORS: &[&str] = &["eq", "neq", "gt", "gte", "lt", "lte", "in", "present", "blank"];

impl OperatorFamily for ComparisonOperators {
    fn name(&self) -> &'static str {
        "comparison"
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        _session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        let matched = match operator {
            "eq" => values_equal(actual, expected),
            "neq" => !values_equal(actual, expected),
            "gt" => ordering(actual, expected).is_some_and(Ordering::is_gt),
            "gte" => ordering(actual, expected).is_some_and(Ordering::is_ge),
            "lt" => ordering(actual, expected).is_some_and(Ordering::is_lt),
            "lte" => ordering(actual, expected).is_some_and(Ordering::is_le),
            "in" => in_list(actual, expected),
            "present" => is_present(actual) != negated(expected),
            "blank" => !is_present(actual) != negated(expected),
            _ => return None,
        };
        Some(matched)
    }
}

/// 只有两边都是数字或都是字符串时才可比较
fn ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// 标量期望值按单元素列表处理
fn in_list(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
        scalar => values_equal(actual, scalar),
    }
}

/// 非 null 且（如有大小概念）非空；0 和 false 视为存在
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// `present`/`blank` 的期望值为 false 时取反
fn negated(expected: &Value) -> bool {
    matches!(expected, Value::Bool(false))
}
