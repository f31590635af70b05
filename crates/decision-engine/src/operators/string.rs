//! 字符串操作符：contains / starts_with / ends_with / matches

use super::{OperatorFamily, values_equal};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct StringOperators;

impl OperatorFamily for StringOperators {
    fn name(&self) -> &'static str {
        "string"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["contains", "starts_with", "ends_with", "matches"]
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        let matched = match operator {
            "contains" => match (actual, expected) {
                (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
                (Value::Array(items), _) => items.iter().any(|item| values_equal(item, expected)),
                _ => false,
            },
            "starts_with" => match (actual, expected) {
                (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
                _ => false,
            },
            "ends_with" => match (actual, expected) {
                (Value::String(s), Value::String(suffix)) => s.ends_with(suffix.as_str()),
                _ => false,
            },
            "matches" => match (actual, expected) {
                (Value::String(s), Value::String(pattern)) => session
                    .caches()
                    .regex(pattern)
                    .is_some_and(|re| re.is_match(s)),
                _ => false,
            },
            _ => return None,
        };
        Some(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EngineCaches;
    use crate::context::Context;
    use serde_json::json;

    fn eval_with(caches: &EngineCaches, op: &str, actual: Value, expected: Value) -> bool {
        let ctx = Context::default();
        let mut session = EvaluationSession::new(&ctx, caches);
        StringOperators
            .evaluate(op, &actual, &expected, &mut session)
            .unwrap()
    }

    fn eval(op: &str, actual: Value, expected: Value) -> bool {
        eval_with(&EngineCaches::default(), op, actual, expected)
    }

    #[test]
    fn test_contains() {
        assert!(eval("contains", json!("hello world"), json!("world")));
        assert!(!eval("contains", json!("hello world"), json!("World")));
        assert!(eval("contains", json!(["a", "b"]), json!("b")));
        assert!(!eval("contains", json!(42), json!("4")));
    }

    #[test]
    fn test_prefix_suffix_case_sensitive() {
        assert!(eval("starts_with", json!("hello world"), json!("hello")));
        assert!(!eval("starts_with", json!("hello world"), json!("Hello")));
        assert!(eval("ends_with", json!("report.pdf"), json!(".pdf")));
        assert!(!eval("ends_with", json!(["report.pdf"]), json!(".pdf")));
    }

    #[test]
    fn test_matches_uses_cache_and_fails_closed() {
        let caches = EngineCaches::default();
        let email = r"^[\w.-]+@[\w.-]+\.\w+$";
        assert!(eval_with(&caches, "matches", json!("user@example.com"), json!(email)));
        assert!(!eval_with(&caches, "matches", json!("not-an-email"), json!(email)));
        assert_eq!(caches.sizes().regex, 1);

        assert!(!eval_with(&caches, "matches", json!("abc"), json!("[invalid")));
        assert!(!eval_with(&caches, "matches", json!(123), json!(r"\d+")));
    }
}
