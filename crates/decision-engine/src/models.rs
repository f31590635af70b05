//! 决策引擎领域模型

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// 通配条件使用的保留字段名，求值时不访问上下文，恒为真
pub const ALWAYS_MATCH_FIELD: &str = "__always_match__";

/// 条件树
///
/// 线上格式与规则源保持一致：`{"all": [..]}`、`{"any": [..]}`、
/// `{"field": "a.b", "operator": "gt", "value": 5}`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConditionRepr", into = "ConditionRepr")]
pub enum Condition {
    Field(FieldCondition),
    /// 空列表恒为真
    All(Vec<Condition>),
    /// 空列表恒为假
    Any(Vec<Condition>),
}

impl Condition {
    pub fn field(path: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field(FieldCondition::new(path, operator, value))
    }

    pub fn all(children: Vec<Condition>) -> Self {
        Self::All(children)
    }

    pub fn any(children: Vec<Condition>) -> Self {
        Self::Any(children)
    }

    /// "不关心" 通配条件
    pub fn always_match() -> Self {
        Self::field(ALWAYS_MATCH_FIELD, "eq", true)
    }

    pub fn is_always_match(&self) -> bool {
        matches!(self, Self::Field(cond) if cond.is_always_match())
    }
}

/// 字段条件节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl FieldCondition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn is_always_match(&self) -> bool {
        self.field == ALWAYS_MATCH_FIELD && self.operator == "eq" && self.value == Value::Bool(true)
    }
}

impl fmt::Display for FieldCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ConditionRepr {
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Field(FieldCondition),
}

impl From<ConditionRepr> for Condition {
    fn from(repr: ConditionRepr) -> Self {
        match repr {
            ConditionRepr::All { all } => Self::All(all),
            ConditionRepr::Any { any } => Self::Any(any),
            ConditionRepr::Field(cond) => Self::Field(cond),
        }
    }
}

impl From<Condition> for ConditionRepr {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::All(all) => Self::All { all },
            Condition::Any(any) => Self::Any { any },
            Condition::Field(cond) => Self::Field(cond),
        }
    }
}

/// 决策表命中策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HitPolicy {
    First,
    Unique,
    Priority,
    Any,
    Collect,
}

impl fmt::Display for HitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::First => "FIRST",
            Self::Unique => "UNIQUE",
            Self::Priority => "PRIORITY",
            Self::Any => "ANY",
            Self::Collect => "COLLECT",
        };
        write!(f, "{}", s)
    }
}

/// 编译后的决策规则（表格中的一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub condition: Condition,
    pub outputs: Map<String, Value>,
    /// 行号决定优先级，没有其他优先级来源
    pub row_index: usize,
}

/// 输入列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputColumn {
    /// 绑定的上下文字段路径
    pub field: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// 输出列
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputColumn {
    pub name: String,
}

/// 编译后的决策表
///
/// 规则顺序与源表完全一致，任何阶段都不会重新排序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTable {
    pub id: String,
    pub name: String,
    pub hit_policy: HitPolicy,
    pub inputs: Vec<InputColumn>,
    pub outputs: Vec<OutputColumn>,
    pub rules: Vec<Rule>,
}

/// 决策表的文本定义（单元格为 FEEL-lite 文本）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTableDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub hit_policy: HitPolicy,
    pub inputs: Vec<InputColumn>,
    pub outputs: Vec<OutputColumn>,
    pub rules: Vec<RuleDefinition>,
}

/// 决策表中一行的文本定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<Value>,
}

/// 决策结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub hit_policy: HitPolicy,
    /// 主决策对应的规则
    pub rule_id: String,
    /// 主决策输出
    pub outputs: Map<String, Value>,
    /// 所有匹配规则，保持表格顺序
    pub matched_rule_ids: Vec<String>,
    pub matched_outputs: Vec<Map<String, Value>>,
    pub match_count: usize,
    pub confidence: f64,
}

/// 决策表求值结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Decided(Decision),
    /// 正常的未命中，不是模型错误
    NoMatch,
}

impl Resolution {
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Decided(decision) => Some(decision),
            Self::NoMatch => None,
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }
}

/// 带追踪的条件评估结果
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub matched_conditions: Vec<String>,
    pub evaluation_trace: Vec<String>,
    pub evaluation_time_us: u64,
}

impl EvaluationResult {
    pub fn new() -> Self {
        Self {
            matched: false,
            matched_conditions: Vec::new(),
            evaluation_trace: Vec::new(),
            evaluation_time_us: 0,
        }
    }
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_deserialization() {
        let json = r#"
        {
            "all": [
                {"field": "event.type", "operator": "eq", "value": "PURCHASE"},
                {"any": [
                    {"field": "order.amount", "operator": "gte", "value": 500},
                    {"field": "user.vip", "operator": "present"}
                ]}
            ]
        }
        "#;

        let condition: Condition = serde_json::from_str(json).unwrap();
        let Condition::All(children) = &condition else {
            panic!("expected all group");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(
            children[0],
            Condition::field("event.type", "eq", "PURCHASE")
        );
        let Condition::Any(nested) = &children[1] else {
            panic!("expected any group");
        };
        assert_eq!(nested[1], Condition::field("user.vip", "present", Value::Null));
    }

    #[test]
    fn test_condition_serialization_shape() {
        let condition = Condition::any(vec![Condition::field("a", "gt", 1)]);
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(
            value,
            json!({"any": [{"field": "a", "operator": "gt", "value": 1}]})
        );
    }

    #[test]
    fn test_always_match_sentinel() {
        assert!(Condition::always_match().is_always_match());
        assert!(!Condition::field(ALWAYS_MATCH_FIELD, "eq", false).is_always_match());
        assert!(!Condition::all(vec![]).is_always_match());
    }

    #[test]
    fn test_hit_policy_serde() {
        let policy: HitPolicy = serde_json::from_str("\"COLLECT\"").unwrap();
        assert_eq!(policy, HitPolicy::Collect);
        assert_eq!(HitPolicy::Priority.to_string(), "PRIORITY");
    }

    #[test]
    fn test_table_definition_deserialization() {
        let json = r#"
        {
            "id": "age-band",
            "hit_policy": "UNIQUE",
            "inputs": [{"field": "applicant.age"}],
            "outputs": [{"name": "band"}],
            "rules": [
                {"inputs": ["[0..18)"], "outputs": ["minor"]},
                {"id": "adult", "inputs": [">= 18"], "outputs": ["adult"]}
            ]
        }
        "#;

        let definition: DecisionTableDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.hit_policy, HitPolicy::Unique);
        assert_eq!(definition.rules.len(), 2);
        assert!(definition.rules[0].id.is_none());
        assert_eq!(definition.rules[1].id.as_deref(), Some("adult"));
    }
}
