//! 金融公式操作符：compound_interest / present_value / future_value / payment
//!
//! 实际值为本金（或终值），公式参数取自期望值。`result` 标量比较前两边都保留两位小数。

use super::OperatorFamily;
use super::params::{Expectation, NormalizedParam, as_number, expectation_without, normalized, number_field};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct FinancialOperators;

impl OperatorFamily for FinancialOperators {
    fn name(&self) -> &'static str {
        "financial"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["compound_interest", "present_value", "future_value", "payment"]
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        if !self.operators().contains(&operator) {
            return None;
        }
        let Some(amount) = as_number(actual) else {
            return Some(false);
        };
        let Some(param) = normalized(session, operator, expected, |v| financial_param(operator, v))
        else {
            return Some(false);
        };
        let NormalizedParam::Financial {
            rate,
            periods,
            compounds_per_year,
            expect,
        } = *param
        else {
            return Some(false);
        };

        let computed = match operator {
            "compound_interest" => compound_interest(amount, rate, periods, compounds_per_year),
            "present_value" => present_value(amount, rate, periods),
            "future_value" => future_value(amount, rate, periods),
            _ => payment(amount, rate, periods),
        };
        let Some(computed) = computed.filter(|c| c.is_finite()) else {
            return Some(false);
        };

        Some(match expect {
            Expectation::Value(target) => round2(computed) == round2(target),
            Expectation::Compare(comparator) => comparator.matches(computed),
        })
    }
}

/// A = P(1 + r/n)^(nt)
pub fn compound_interest(principal: f64, rate: f64, years: f64, n: f64) -> Option<f64> {
    (n > 0.0).then(|| principal * (1.0 + rate / n).powf(n * years))
}

/// PV = FV / (1 + r)^t
pub fn present_value(future: f64, rate: f64, periods: f64) -> Option<f64> {
    let factor = (1.0 + rate).powf(periods);
    (factor != 0.0).then(|| future / factor)
}

/// FV = PV (1 + r)^t
pub fn future_value(present: f64, rate: f64, periods: f64) -> Option<f64> {
    Some(present * (1.0 + rate).powf(periods))
}

/// PMT = P r / (1 - (1 + r)^-n)，零利率时为 P / n
pub fn payment(principal: f64, rate: f64, periods: f64) -> Option<f64> {
    if periods <= 0.0 {
        return None;
    }
    if rate == 0.0 {
        return Some(principal / periods);
    }
    Some(principal * rate / (1.0 - (1.0 + rate).powf(-periods)))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn financial_param(operator: &str, expected: &Value) -> Option<NormalizedParam> {
    let map = expected.as_object()?;
    let periods_keys: &[&str] = if operator == "compound_interest" {
        &["years", "periods"]
    } else {
        &["periods", "years"]
    };
    Some(NormalizedParam::Financial {
        rate: number_field(map, &["rate"])?,
        periods: number_field(map, periods_keys)?,
        compounds_per_year: match map.get("compounds_per_year") {
            Some(n) => as_number(n)?,
            None => 1.0,
        },
        expect: expectation_without(map)?,
    })
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
        FinancialOperators
            .evaluate(op, &actual, &expected, &mut session)
            .unwrap()
    }

    #[test]
    fn test_compound_interest() {
        // 1000 * (1 + 0.05/12)^(120) = 1647.01
        assert!(eval(
            "compound_interest",
            json!(1000),
            json!({"rate": 0.05, "years": 10, "compounds_per_year": 12, "result": 1647.01})
        ));
        assert!(eval(
            "compound_interest",
            json!(1000),
            json!({"rate": 0.1, "years": 2, "result": 1210})
        ));
        assert!(!eval(
            "compound_interest",
            json!(1000),
            json!({"rate": 0.1, "years": 2, "compounds_per_year": 0, "result": 1210})
        ));
    }

    #[test]
    fn test_present_and_future_value() {
        assert!(eval("future_value", json!(1000), json!({"rate": 0.05, "periods": 2, "result": 1102.50})));
        assert!(eval("present_value", json!(1102.5), json!({"rate": 0.05, "periods": 2, "result": 1000})));
        assert!(eval("future_value", json!(1000), json!({"rate": 0.05, "periods": 3, "gt": 1150})));
    }

    #[test]
    fn test_payment() {
        // 200000 @ 0.5%/月, 360 期 -> 1199.10
        assert!(eval("payment", json!(200000), json!({"rate": 0.005, "periods": 360, "result": 1199.10})));
        assert!(eval("payment", json!(1200), json!({"rate": 0, "periods": 12, "result": 100})));
        assert!(!eval("payment", json!(1200), json!({"rate": 0, "periods": 0, "result": 0})));
    }

    #[test]
    fn test_missing_parameters() {
        assert!(!eval("payment", json!(1200), json!({"periods": 12, "result": 100})));
        assert!(!eval("future_value", json!(1000), json!(1157.63)));
    }
}
