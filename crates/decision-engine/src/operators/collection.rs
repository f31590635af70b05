//! 集合操作符：contains_all / contains_any / intersects / subset_of
//!
//! 使用哈希集合做成员判断，避免嵌套扫描。

use super::{OperatorFamily, hash_key};
use crate::context::EvaluationSession;
use serde_json::Value;
use std::collections::HashSet;

pub struct CollectionOperators;

impl OperatorFamily for CollectionOperators {
    fn name(&self) -> &'static str {
        "collection"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["contains_all", "contains_any", "intersects", "subset_of"]
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        _session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        let matched = match operator {
            "contains_all" => match (actual.as_array(), expected.as_array()) {
                (Some(have), Some(want)) => {
                    let have = key_set(have);
                    want.iter().all(|item| have.contains(&hash_key(item)))
                }
                _ => false,
            },
            "contains_any" => match (actual.as_array(), expected.as_array()) {
                (Some(have), Some(want)) => overlaps(have, want),
                _ => false,
            },
            "intersects" => match (actual.as_array(), expected.as_array()) {
                (Some(left), Some(right)) => overlaps(left, right),
                _ => false,
            },
            // 字段缺失或不是列表时不匹配，空列表是任何集合的子集
            "subset_of" => match (actual.as_array(), expected.as_array()) {
                (Some(have), Some(allowed)) => {
                    let allowed = key_set(allowed);
                    have.iter().all(|item| allowed.contains(&hash_key(item)))
                }
                _ => false,
            },
            _ => return None,
        };
        Some(matched)
    }
}

fn key_set(items: &[Value]) -> HashSet<String> {
    items.iter().map(hash_key).collect()
}

fn overlaps(left: &[Value], right: &[Value]) -> bool {
    let (small, large) = if left.len() <= right.len() {
        (left, right)
    } else {
        (right, left)
    };
    let index = key_set(small);
    large.iter().any(|item| index.contains(&hash_key(item)))
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
        CollectionOperators
            .evaluate(op, &actual, &expected, &mut session)
            .unwrap()
    }

    #[test]
    fn test_contains_all() {
        assert!(eval("contains_all", json!(["a", "b", "c"]), json!(["a", "b"])));
        assert!(!eval("contains_all", json!(["a", "b", "c"]), json!(["a", "d"])));
        assert!(eval("contains_all", json!([1, 2, 3]), json!([2.0, 3])));
        assert!(!eval("contains_all", json!("abc"), json!(["a"])));
    }

    #[test]
    fn test_contains_any_and_intersects() {
        assert!(eval("contains_any", json!(["a", "b", "c"]), json!(["b", "d"])));
        assert!(!eval("contains_any", json!(["a", "b", "c"]), json!(["x", "y"])));
        assert!(!eval("contains_any", json!("a"), json!(["a"])));
        assert!(eval("intersects", json!(["x", "a"]), json!(["a", "z"])));
        assert!(!eval("intersects", json!("a"), json!(["a", "z"])));
        assert!(!eval("intersects", json!(["x", "a"]), json!("a")));
        assert!(!eval("intersects", Value::Null, json!(["a"])));
    }

    #[test]
    fn test_subset_of() {
        assert!(eval("subset_of", json!(["a", "b"]), json!(["a", "b", "c"])));
        assert!(eval("subset_of", json!([]), json!(["a"])));
        assert!(!eval("subset_of", json!("b"), json!(["a", "b"])));
        assert!(!eval("subset_of", Value::Null, json!(["a"])));
        assert!(!eval("subset_of", json!(["a", "q"]), json!(["a", "b"])));
        assert!(!eval("subset_of", json!(["a"]), json!("a")));
    }

    #[test]
    fn test_absent_field_does_not_match() {
        use crate::engine::EvaluationEngine;
        use crate::models::Condition;

        let engine = EvaluationEngine::new();
        let ctx = Context::new(json!({}));
        for op in ["subset_of", "intersects", "contains_all", "contains_any"] {
            let condition = Condition::field("user.roles", op, json!(["admin"]));
            assert!(!engine.evaluate(&condition, &ctx), "{op}");
        }

        let ctx = Context::new(json!({"user": {"roles": ["admin"]}}));
        let condition = Condition::field("user.roles", "subset_of", json!(["admin", "ops"]));
        assert!(engine.evaluate(&condition, &ctx));
    }

    #[test]
    fn test_strings_and_numbers_do_not_collide() {
        assert!(!eval("contains_any", json!(["1"]), json!([1])));
    }
}
