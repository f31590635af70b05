//! 数学函数操作符
//!
//! 对实际值计算指定函数，再与期望结果比较。整数值函数使用精确相等，
//! 其余使用 1e-10 容差。定义域错误一律不匹配。

use super::OperatorFamily;
use super::params::{Expectation, NormalizedParam, as_number, expectation_without, normalized};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct MathOperators;

const UNARY: &[&str] = &[
    "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "sqrt", "cbrt", "exp",
    "log", "log10", "log2", "floor", "ceil", "abs", "truncate", "factorial",
];

const OPERATORS: &[&str] = &[
    "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "sinh", "cosh", "tanh", "sqrt", "cbrt",
    "power", "exp", "log", "log10", "log2", "round", "floor", "ceil", "abs", "truncate",
    "factorial", "gcd", "lcm",
];

/// 结果为整数值的函数，使用精确相等
const EXACT: &[&str] = &["round", "floor", "ceil", "abs", "truncate", "factorial", "gcd", "lcm"];

/// f64 可精确表示的最大阶乘输入
const MAX_FACTORIAL: f64 = 170.0;

impl OperatorFamily for MathOperators {
    fn name(&self) -> &'static str {
        "math"
    }

    fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        if !OPERATORS.contains(&operator) {
            return None;
        }
        let Some(x) = as_number(actual) else {
            return Some(false);
        };

        let outcome = if UNARY.contains(&operator) {
            Expectation::parse(expected).and_then(|expect| Some((unary(operator, x)?, expect)))
        } else {
            let param = normalized(session, operator, expected, |v| binary_param(operator, v));
            param.and_then(|param| match *param {
                NormalizedParam::WithArg { arg, expect } => Some((binary(operator, x, arg)?, expect)),
                NormalizedParam::Expect(expect) => Some((binary(operator, x, 0.0)?, expect)),
                _ => None,
            })
        };

        let Some((result, expect)) = outcome else {
            return Some(false);
        };
        if !result.is_finite() {
            return Some(false);
        }

        Some(if EXACT.contains(&operator) {
            expect.matches_exact(result)
        } else {
            expect.matches(result)
        })
    }
}

fn unary(operator: &str, x: f64) -> Option<f64> {
    let result = match operator {
        "sin" => x.sin(),
        "cos" => x.cos(),
        "tan" => x.tan(),
        "asin" if (-1.0..=1.0).contains(&x) => x.asin(),
        "acos" if (-1.0..=1.0).contains(&x) => x.acos(),
        "atan" => x.atan(),
        "sinh" => x.sinh(),
        "cosh" => x.cosh(),
        "tanh" => x.tanh(),
        "sqrt" if x >= 0.0 => x.sqrt(),
        "cbrt" => x.cbrt(),
        "exp" => x.exp(),
        "log" if x > 0.0 => x.ln(),
        "log10" if x > 0.0 => x.log10(),
        "log2" if x > 0.0 => x.log2(),
        "floor" => x.floor(),
        "ceil" => x.ceil(),
        "abs" => x.abs(),
        "truncate" => x.trunc(),
        "factorial" => factorial(x)?,
        _ => return None,
    };
    Some(result)
}

/// `round` 的附加参数是小数位数（缺省 0），其余为第二操作数
fn binary(operator: &str, x: f64, arg: f64) -> Option<f64> {
    let result = match operator {
        "atan2" => x.atan2(arg),
        "power" => x.powf(arg),
        "round" => {
            let factor = 10f64.powi(arg as i32);
            (x * factor).round() / factor
        }
        "gcd" => gcd(integer(x)?, integer(arg)?) as f64,
        "lcm" => {
            let (a, b) = (integer(x)?, integer(arg)?);
            if a == 0 || b == 0 {
                0.0
            } else {
                (a / gcd(a, b)).checked_mul(b)?.unsigned_abs() as f64
            }
        }
        _ => return None,
    };
    Some(result)
}

/// 二元函数参数：`[arg, result]`、`{"arg", "result"}`；`round` 额外接受标量或 `{"digits", "result"}`
fn binary_param(operator: &str, expected: &Value) -> Option<NormalizedParam> {
    match expected {
        Value::Array(items) if items.len() == 2 => Some(NormalizedParam::WithArg {
            arg: as_number(&items[0])?,
            expect: Expectation::parse(&items[1])?,
        }),
        Value::Object(map) => {
            let arg_key = if operator == "round" { "digits" } else { "arg" };
            match map.get(arg_key) {
                Some(arg) => Some(NormalizedParam::WithArg {
                    arg: as_number(arg)?,
                    expect: expectation_without(map)?,
                }),
                None if operator == "round" => expectation_without(map).map(NormalizedParam::Expect),
                None => None,
            }
        }
        Value::Number(_) if operator == "round" => {
            Expectation::parse(expected).map(NormalizedParam::Expect)
        }
        _ => None,
    }
}

fn integer(x: f64) -> Option<i64> {
    (x.fract() == 0.0 && x.abs() < 9.0e15).then_some(x as i64)
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn factorial(x: f64) -> Option<f64> {
    if x < 0.0 || x.fract() != 0.0 || x > MAX_FACTORIAL {
        return None;
    }
    Some((1..=x as u32).fold(1.0, |acc, n| acc * n as f64))
}
