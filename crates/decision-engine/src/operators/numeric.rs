//! 数值操作符：between / modulo

use super::OperatorFamily;
use super::params::{NormalizedParam, approx_eq, as_number, modulo_param, normalized, range_param};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct NumericOperators;

impl OperatorFamily for NumericOperators {
    fn name(&self) -> &'static str {
        "numeric"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["between", "modulo"]
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        let matched = match operator {
            "between" => between(actual, expected, session),
            "modulo" => modulo(actual, expected, session),
            _ => return None,
        };
        Some(matched)
    }
}

/// 闭区间 `[min, max]`
fn between(actual: &Value, expected: &Value, session: &EvaluationSession<'_>) -> bool {
    let Some(x) = as_number(actual) else {
        return false;
    };
    let Some(param) = normalized(session, "between", expected, range_param) else {
        return false;
    };
    match *param {
        NormalizedParam::Range { min, max } => x >= min && x <= max,
        _ => false,
    }
}

/// 向下取整取模，余数符号与除数一致
fn modulo(actual: &Value, expected: &Value, session: &EvaluationSession<'_>) -> bool {
    let Some(x) = as_number(actual) else {
        return false;
    };
    let Some(param) = normalized(session, "modulo", expected, modulo_param) else {
        return false;
    };
    match *param {
        NormalizedParam::Modulo { divisor, remainder } if divisor != 0.0 => {
            let r = x - divisor * (x / divisor).floor();
            approx_eq(r, remainder)
        }
        _ => false,
    }
}
