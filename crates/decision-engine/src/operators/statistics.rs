//! 统计聚合操作符
//!
//! 作用于列表字段，忽略非数字元素；空列表或全部为非数字时不匹配。

use super::OperatorFamily;
use super::params::{
    Expectation, NormalizedParam, expectation_without, normalized, number_field, numeric_elements,
};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct StatisticsOperators;

const OPERATORS: &[&str] = &[
    "min", "max", "sum", "average", "mean", "median", "stddev", "variance", "percentile", "count",
];

impl OperatorFamily for StatisticsOperators {
    fn name(&self) -> &'static str {
        "statistics"
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
        let Some(numbers) = numeric_elements(actual) else {
            return Some(false);
        };

        if operator == "percentile" {
            let param = normalized(session, "percentile", expected, percentile_param);
            let matched = param.is_some_and(|param| match *param {
                NormalizedParam::WithArg { arg, expect } => {
                    percentile(&numbers, arg).is_some_and(|p| expect.matches(p))
                }
                _ => false,
            });
            return Some(matched);
        }

        let Some(expect) = Expectation::parse(expected) else {
            return Some(false);
        };
        let stat = match operator {
            "min" => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            "max" => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            "sum" => numbers.iter().sum(),
            "average" | "mean" => mean(&numbers),
            "median" => percentile(&numbers, 50.0).unwrap_or(f64::NAN),
            "variance" => variance(&numbers),
            "stddev" => variance(&numbers).sqrt(),
            _ => numbers.len() as f64,
        };
        Some(expect.matches(stat))
    }
}

pub fn mean(numbers: &[f64]) -> f64 {
    numbers.iter().sum::<f64>() / numbers.len() as f64
}

/// 总体方差
pub fn variance(numbers: &[f64]) -> f64 {
    let m = mean(numbers);
    numbers.iter().map(|x| (x - m).powi(2)).sum::<f64>() / numbers.len() as f64
}

/// 顺序统计量之间线性插值，`p` 取值 0..=100
pub fn percentile(numbers: &[f64], p: f64) -> Option<f64> {
    if numbers.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let mut sorted = numbers.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

fn percentile_param(expected: &Value) -> Option<NormalizedParam> {
    let map = expected.as_object()?;
    Some(NormalizedParam::WithArg {
        arg: number_field(map, &["percentile", "p"])?,
        expect: expectation_without(map)?,
    })
}
