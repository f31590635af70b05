//! 日期时间操作符
//!
//! 包括日期比较、时长、日期运算和时间分量提取四组操作符。
//! 字符串时间经日期缓存解析（ISO-8601 快速路径），整数视为 Unix 秒。
//! 参考时间可以是 `"now"`、另一个上下文字段路径或时间字面量。

use super::OperatorFamily;
use super::params::{Comparator, approx_eq, as_number};
use crate::context::EvaluationSession;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use serde_json::{Map, Value};

pub struct TemporalOperators;

const OPERATORS: &[&str] = &[
    "before_date",
    "after_date",
    "within_days",
    "day_of_week",
    "duration_seconds",
    "duration_minutes",
    "duration_hours",
    "duration_days",
    "add_days",
    "subtract_days",
    "add_hours",
    "subtract_hours",
    "add_minutes",
    "subtract_minutes",
    "hour_of_day",
    "day_of_month",
    "month",
    "year",
    "week_of_year",
];

const SECONDS_PER_DAY: f64 = 86_400.0;

impl OperatorFamily for TemporalOperators {
    fn name(&self) -> &'static str {
        "temporal"
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
        let Some(at) = timestamp(actual, session) else {
            return Some(false);
        };

        let matched = match operator {
            "before_date" => reference(expected, session).is_some_and(|r| at < r),
            "after_date" => reference(expected, session).is_some_and(|r| at > r),
            "within_days" => within_days(at, expected, session),
            "day_of_week" => day_of_week(at.weekday(), expected),
            "duration_seconds" => duration(at, expected, session, 1.0),
            "duration_minutes" => duration(at, expected, session, 60.0),
            "duration_hours" => duration(at, expected, session, 3_600.0),
            "duration_days" => duration(at, expected, session, SECONDS_PER_DAY),
            "add_days" => shifted(at, expected, session, Duration::try_days, 1),
            "subtract_days" => shifted(at, expected, session, Duration::try_days, -1),
            "add_hours" => shifted(at, expected, session, Duration::try_hours, 1),
            "subtract_hours" => shifted(at, expected, session, Duration::try_hours, -1),
            "add_minutes" => shifted(at, expected, session, Duration::try_minutes, 1),
            "subtract_minutes" => shifted(at, expected, session, Duration::try_minutes, -1),
            "hour_of_day" => component(at.hour() as f64, expected),
            "day_of_month" => component(at.day() as f64, expected),
            "month" => component(at.month() as f64, expected),
            "year" => component(at.year() as f64, expected),
            _ => component(at.iso_week().week() as f64, expected),
        };
        Some(matched)
    }
}

/// 解析时间字面量（结果由日期缓存表记忆）
pub fn parse_timestamp_literal(literal: &str) -> Option<DateTime<Utc>> {
    let s = literal.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// 把值解析为时间点
pub fn timestamp(value: &Value, session: &EvaluationSession<'_>) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => session.caches().parse_date(s),
        Value::Number(n) => Utc.timestamp_opt(n.as_i64()?, 0).single(),
        _ => None,
    }
}

/// 解析参考时间："now"、字段路径或时间字面量
pub fn reference(value: &Value, session: &EvaluationSession<'_>) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) if s == "now" => Some(session.now()),
        Value::String(s) => match session.lookup(s) {
            Some(found) => timestamp(&found, session),
            None => session.caches().parse_date(s),
        },
        other => timestamp(other, session),
    }
}

fn within_days(at: DateTime<Utc>, expected: &Value, session: &EvaluationSession<'_>) -> bool {
    let (days, reference_value) = match expected {
        Value::Number(_) => (as_number(expected), None),
        Value::Object(map) => (map.get("days").and_then(as_number), map.get("reference")),
        _ => (None, None),
    };
    let Some(days) = days else {
        return false;
    };
    let reference_at = match reference_value {
        Some(r) => reference(r, session),
        None => Some(session.now()),
    };
    reference_at.is_some_and(|r| {
        let seconds = (r - at).num_milliseconds().abs() as f64 / 1000.0;
        seconds <= days * SECONDS_PER_DAY
    })
}

fn weekday_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().filter(|d| *d <= 6).map(|d| d as u32),
        Value::String(s) => {
            let weekday: Weekday = s.trim().parse().ok()?;
            Some(weekday.num_days_from_sunday())
        }
        _ => None,
    }
}

/// 0 = 周日；期望值可以是名称、数字或它们的列表
fn day_of_week(weekday: Weekday, expected: &Value) -> bool {
    let actual = weekday.num_days_from_sunday();
    match expected {
        Value::Array(items) => items
            .iter()
            .any(|item| weekday_from_value(item) == Some(actual)),
        other => weekday_from_value(other) == Some(actual),
    }
}

fn duration(
    at: DateTime<Utc>,
    expected: &Value,
    session: &EvaluationSession<'_>,
    unit_seconds: f64,
) -> bool {
    let Some(map) = expected.as_object() else {
        return false;
    };
    let end = match map.get("end").or_else(|| map.get("to")) {
        Some(r) => reference(r, session),
        None => Some(session.now()),
    };
    let (Some(end), Some(comparator)) = (end, Comparator::from_map(map)) else {
        return false;
    };
    let delta = (end - at).num_milliseconds() as f64 / 1000.0 / unit_seconds;
    comparator.matches(delta)
}

/// 时间点平移后与参考时间比较，全部子句需成立且至少一个
fn shifted(
    at: DateTime<Utc>,
    expected: &Value,
    session: &EvaluationSession<'_>,
    unit: fn(i64) -> Option<Duration>,
    sign: i64,
) -> bool {
    let Some(map) = expected.as_object() else {
        return false;
    };
    let Some(delta) = map
        .get("amount")
        .and_then(Value::as_i64)
        .and_then(|amount| amount.checked_mul(sign))
        .and_then(unit)
    else {
        return false;
    };
    let Some(moved) = at.checked_add_signed(delta) else {
        return false;
    };
    shifted_clauses(moved, map, session)
}

fn shifted_clauses(
    moved: DateTime<Utc>,
    map: &Map<String, Value>,
    session: &EvaluationSession<'_>,
) -> bool {
    let mut checked = 0;
    for key in ["before", "after", "on_or_before", "on_or_after"] {
        let Some(raw) = map.get(key) else { continue };
        let Some(r) = reference(raw, session) else {
            return false;
        };
        let holds = match key {
            "before" => moved < r,
            "after" => moved > r,
            "on_or_before" => moved <= r,
            _ => moved >= r,
        };
        if !holds {
            return false;
        }
        checked += 1;
    }
    checked > 0
}

fn component(value: f64, expected: &Value) -> bool {
    match expected {
        Value::Number(_) => as_number(expected).is_some_and(|e| approx_eq(e, value)),
        Value::Array(items) => items
            .iter()
            .filter_map(as_number)
            .any(|e| approx_eq(e, value)),
        Value::Object(map) => Comparator::from_map(map).is_some_and(|c| c.matches(value)),
        _ => false,
    }
}
