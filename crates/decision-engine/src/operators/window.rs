//! 移动窗口操作符：moving_average / moving_sum / moving_max / moving_min
//!
//! 期望值 `{"window": n, <比较器>}`，窗口取列表末尾 n 个数字，n 超过长度时截断。

use super::OperatorFamily;
use super::params::{Comparator, Expectation, NormalizedParam, normalized, number_field, numeric_elements};
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct MovingWindowOperators;

impl OperatorFamily for MovingWindowOperators {
    fn name(&self) -> &'static str {
        "moving_window"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["moving_average", "moving_sum", "moving_max", "moving_min"]
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
        let Some(numbers) = numeric_elements(actual) else {
            return Some(false);
        };
        let Some(param) = normalized(session, "window", expected, window_param) else {
            return Some(false);
        };
        let NormalizedParam::WithArg { arg, expect } = *param else {
            return Some(false);
        };
        if arg < 1.0 {
            return Some(false);
        }

        let size = (arg as usize).min(numbers.len());
        let window = &numbers[numbers.len() - size..];
        let stat = match operator {
            "moving_average" => window.iter().sum::<f64>() / size as f64,
            "moving_sum" => window.iter().sum(),
            "moving_max" => window.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            _ => window.iter().copied().fold(f64::INFINITY, f64::min),
        };
        Some(expect.matches(stat))
    }
}

fn window_param(expected: &Value) -> Option<NormalizedParam> {
    let map = expected.as_object()?;
    Some(NormalizedParam::WithArg {
        arg: number_field(map, &["window", "size"])?,
        expect: Expectation::Compare(Comparator::from_map(map)?),
    })
}
