//! 操作符结构化参数的归一化
//!
//! 结构化期望值（如 `[min, max]` 或 `{min, max}`）只解析一次，
//! 按 "种类:原始 JSON" 作为规范键缓存在参数缓存表中。

use crate::context::EvaluationSession;
use serde_json::{Map, Value};
use std::sync::Arc;

/// 浮点相等容差
pub const EPSILON: f64 = 1e-10;

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

/// 仅接受 JSON 数字，不做字符串到数字的转换
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// 列表中的数字元素，非数字元素被忽略
pub fn numeric_elements(value: &Value) -> Option<Vec<f64>> {
    let items = value.as_array()?;
    let numbers: Vec<f64> = items.iter().filter_map(as_number).collect();
    if numbers.is_empty() { None } else { Some(numbers) }
}

/// 从对象中读取第一个存在的数字键
pub fn number_field(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key)).and_then(as_number)
}

/// 结构化比较器：所有出现的子句都必须成立
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Comparator {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub gt: Option<f64>,
    pub gte: Option<f64>,
    pub lt: Option<f64>,
    pub lte: Option<f64>,
    pub eq: Option<f64>,
}

impl Comparator {
    pub const KEYS: [&'static str; 7] = ["min", "max", "gt", "gte", "lt", "lte", "eq"];

    /// 从对象解析；没有任何比较键或比较键的值不是数字时返回 None
    pub fn from_map(map: &Map<String, Value>) -> Option<Self> {
        let mut comparator = Self::default();
        let mut found = false;
        for key in Self::KEYS {
            let Some(raw) = map.get(key) else { continue };
            let bound = as_number(raw)?;
            found = true;
            match key {
                "min" => comparator.min = Some(bound),
                "max" => comparator.max = Some(bound),
                "gt" => comparator.gt = Some(bound),
                "gte" => comparator.gte = Some(bound),
                "lt" => comparator.lt = Some(bound),
                "lte" => comparator.lte = Some(bound),
                _ => comparator.eq = Some(bound),
            }
        }
        found.then_some(comparator)
    }

    pub fn matches(&self, x: f64) -> bool {
        self.min.is_none_or(|b| x >= b)
            && self.max.is_none_or(|b| x <= b)
            && self.gt.is_none_or(|b| x > b)
            && self.gte.is_none_or(|b| x >= b)
            && self.lt.is_none_or(|b| x < b)
            && self.lte.is_none_or(|b| x <= b)
            && self.eq.is_none_or(|b| approx_eq(x, b))
    }
}

/// 数值期望：标量或比较器
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expectation {
    Value(f64),
    Compare(Comparator),
}

impl Expectation {
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Self::Value),
            Value::Object(map) => Comparator::from_map(map).map(Self::Compare),
            _ => None,
        }
    }

    /// 标量比较使用容差相等
    pub fn matches(&self, x: f64) -> bool {
        match self {
            Self::Value(expected) => approx_eq(x, *expected),
            Self::Compare(comparator) => comparator.matches(x),
        }
    }

    /// 标量比较使用精确相等（整数值函数）
    pub fn matches_exact(&self, x: f64) -> bool {
        match self {
            Self::Value(expected) => x == *expected,
            Self::Compare(comparator) => comparator.matches(x),
        }
    }
}

/// 归一化后的操作符参数
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedParam {
    Range { min: f64, max: f64 },
    Modulo { divisor: f64, remainder: f64 },
    Expect(Expectation),
    /// 带一个附加参数的期望（二元数学函数、窗口大小、百分位等）
    WithArg { arg: f64, expect: Expectation },
    Financial {
        rate: f64,
        periods: f64,
        compounds_per_year: f64,
        expect: Expectation,
    },
}

/// 从 `[a, b]` 或 `{k1: a, k2: b}` 形式读取一对数字
pub fn number_pair(value: &Value, first: &str, second: &str) -> Option<(f64, f64)> {
    match value {
        Value::Array(items) if items.len() == 2 => Some((as_number(&items[0])?, as_number(&items[1])?)),
        Value::Object(map) => Some((as_number(map.get(first)?)?, as_number(map.get(second)?)?)),
        _ => None,
    }
}

/// 期望值中去掉指定键之后的部分作为期望
///
/// `result` / `value` 键视为标量期望，否则取比较器键。
pub fn expectation_without(map: &Map<String, Value>) -> Option<Expectation> {
    if let Some(result) = map.get("result").or_else(|| map.get("value")) {
        return Expectation::parse(result);
    }
    Comparator::from_map(map).map(Expectation::Compare)
}

/// 通过参数缓存获取归一化参数
pub fn normalized(
    session: &EvaluationSession<'_>,
    kind: &str,
    expected: &Value,
    normalize: impl FnOnce(&Value) -> Option<NormalizedParam>,
) -> Option<Arc<NormalizedParam>> {
    let key = format!("{}:{}", kind, expected);
    session.caches().param(&key, || normalize(expected))
}

/// 归一化 `between` 的范围参数
pub fn range_param(expected: &Value) -> Option<NormalizedParam> {
    number_pair(expected, "min", "max").map(|(min, max)| NormalizedParam::Range { min, max })
}

/// 归一化 `modulo` 的参数
pub fn modulo_param(expected: &Value) -> Option<NormalizedParam> {
    number_pair(expected, "divisor", "remainder")
        .map(|(divisor, remainder)| NormalizedParam::Modulo { divisor, remainder })
}
