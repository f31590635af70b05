//! 操作符族与注册表
//!
//! 每个操作符族负责一组互不重叠的操作符名称。注册表按固定优先级依次尝试，
//! 第一个返回 `Some` 的族决定结果；没有任何族认领的操作符按不匹配处理。

pub mod collection;
pub mod comparison;
pub mod enrichment;
pub mod financial;
pub mod geo;
pub mod math;
pub mod numeric;
pub mod params;
pub mod rate;
pub mod statistics;
pub mod string;
pub mod temporal;
pub mod text;
pub mod window;

use crate::context::EvaluationSession;
use serde_json::Value;
use tracing::debug;

/// 操作符族
pub trait OperatorFamily: Send + Sync {
    /// 族名称（用于日志）
    fn name(&self) -> &'static str;

    /// 本族认领的操作符
    fn operators(&self) -> &'static [&'static str];

    /// 评估操作符
    ///
    /// 返回 `None` 表示本族不处理该操作符。参数错误、类型不符等情况返回 `Some(false)`。
    fn evaluate(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool>;
}

/// 操作符注册表
pub struct OperatorRegistry {
    families: Vec<Box<dyn OperatorFamily>>,
}

impl OperatorRegistry {
    /// 创建空注册表
    pub fn empty() -> Self {
        Self {
            families: Vec::new(),
        }
    }

    /// 按默认优先级注册全部内置操作符族（常用操作符在前）
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(comparison::ComparisonOperators));
        registry.register(Box::new(string::StringOperators));
        registry.register(Box::new(numeric::NumericOperators));
        registry.register(Box::new(collection::CollectionOperators));
        registry.register(Box::new(statistics::StatisticsOperators));
        registry.register(Box::new(temporal::TemporalOperators));
        registry.register(Box::new(math::MathOperators));
        registry.register(Box::new(text::TextAggregationOperators));
        registry.register(Box::new(rate::RateOperators));
        registry.register(Box::new(window::MovingWindowOperators));
        registry.register(Box::new(financial::FinancialOperators));
        registry.register(Box::new(geo::GeoOperators));
        registry.register(Box::new(enrichment::EnrichmentOperators));
        registry
    }

    /// 追加操作符族，排在已注册族之后
    pub fn register(&mut self, family: Box<dyn OperatorFamily>) {
        self.families.push(family);
    }

    /// 分发操作符，未知操作符返回 false
    pub fn dispatch(
        &self,
        operator: &str,
        actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> bool {
        for family in &self.families {
            if let Some(matched) = family.evaluate(operator, actual, expected, session) {
                return matched;
            }
        }

        debug!(operator, "未知操作符，按不匹配处理");
        false
    }

    /// 是否有操作符族认领该操作符
    pub fn is_supported(&self, operator: &str) -> bool {
        self.families
            .iter()
            .any(|family| family.operators().contains(&operator))
    }

    /// 全部已注册的操作符，按族优先级排列
    pub fn supported_operators(&self) -> Vec<&'static str> {
        self.families
            .iter()
            .flat_map(|family| family.operators().iter().copied())
            .collect()
    }

    pub fn family_names(&self) -> Vec<&'static str> {
        self.families.iter().map(|family| family.name()).collect()
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 相等比较：数字之间按 f64 比较（100 == 100.0），其他类型结构相等
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// 集合运算使用的规范键，整数值的浮点数与整数同键
pub fn hash_key(value: &Value) -> String {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("n:{}", f as i64),
            Some(f) => format!("n:{}", f),
            None => format!("n:{}", n),
        },
        Value::String(s) => format!("s:{}", s),
        other => format!("j:{}", other),
    }
}

/// 获取值的类型名称
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
