//! 速率操作符：rate_per_second / rate_per_minute / rate_per_hour
//!
//! 实际值为时间戳列表，速率 = 数量 / (最晚 - 最早)，按单位换算。

use super::OperatorFamily;
use super::params::Expectation;
use super::temporal::timestamp;
use crate::context::EvaluationSession;
use serde_json::Value;

pub struct RateOperators;

impl OperatorFamily for RateOperators {
    fn name(&self) -> &'static str {
        "rate"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["rate_per_second", "rate_per_minute", "rate_per_hour"]
    }

    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        let unit_seconds = match operator {
            "rate_per_second" => 1.0,
            "rate_per_minute" => 60.0,
            "rate_per_hour" => 3_600.0,
            _ => return None,
        };

        let (Some(items), Some(expect)) = (actual.as_array(), Expectation::parse(expected)) else {
            return Some(false);
        };
        let mut stamps: Vec<_> = items
            .iter()
            .filter_map(|item| timestamp(item, session))
            .collect();
        if stamps.len() < 2 {
            return Some(false);
        }
        stamps.sort();

        let span_seconds = (stamps[stamps.len() - 1] - stamps[0]).num_milliseconds() as f64 / 1000.0;
        if span_seconds <= 0.0 {
            return Some(false);
        }
        let rate = stamps.len() as f64 / span_seconds * unit_seconds;
        Some(expect.matches(rate))
    }
}
