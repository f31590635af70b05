//! 规则编译器
//!
//! 在求值之前校验条件树，并把决策表定义（FEEL-lite 单元格文本）编译成 `DecisionTable`。
//! 求值阶段假定规则已经通过这里的校验。

use crate::error::{Result, RuleError};
use crate::feel::compile_cell;
use crate::models::{
    ALWAYS_MATCH_FIELD, Condition, DecisionTable, DecisionTableDefinition, FieldCondition, Rule,
};
use crate::operators::OperatorRegistry;
use crate::operators::params::{modulo_param, range_param};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// 编译后的条件
#[derive(Debug, Clone)]
pub struct CompiledCondition {
    pub condition: Condition,
    /// 条件中引用的所有字段路径
    pub required_fields: BTreeSet<String>,
    /// 编译版本号
    pub compile_version: u64,
}

/// 规则编译器
pub struct RuleCompiler {
    registry: Arc<OperatorRegistry>,
    compile_version: u64,
}

impl RuleCompiler {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(OperatorRegistry::new()))
    }

    /// 使用指定注册表校验操作符名称
    pub fn with_registry(registry: Arc<OperatorRegistry>) -> Self {
        Self {
            registry,
            compile_version: 0,
        }
    }

    /// 从 JSON 字符串编译条件
    pub fn compile_from_json(&mut self, json: &str) -> Result<CompiledCondition> {
        let condition: Condition = serde_json::from_str(json)?;
        self.compile(condition)
    }

    /// 校验并编译条件
    pub fn compile(&mut self, condition: Condition) -> Result<CompiledCondition> {
        self.validate(&condition)?;
        let required_fields = required_fields(&condition);

        self.compile_version += 1;

        Ok(CompiledCondition {
            condition,
            required_fields,
            compile_version: self.compile_version,
        })
    }

    /// 校验条件树
    pub fn validate(&self, condition: &Condition) -> Result<()> {
        self.validate_node(condition, "root")
    }

    fn validate_node(&self, node: &Condition, path: &str) -> Result<()> {
        match node {
            Condition::Field(cond) => self.validate_field(cond, path),
            Condition::All(children) | Condition::Any(children) => {
                let label = if matches!(node, Condition::All(_)) { "all" } else { "any" };
                for (i, child) in children.iter().enumerate() {
                    let child_path = format!("{}.{}[{}]", path, label, i);
                    self.validate_node(child, &child_path)?;
                }
                Ok(())
            }
        }
    }

    fn validate_field(&self, cond: &FieldCondition, path: &str) -> Result<()> {
        if cond.is_always_match() {
            return Ok(());
        }

        let invalid = |reason: String| RuleError::InvalidCondition {
            path: path.to_string(),
            reason,
        };

        if cond.field.trim().is_empty() {
            return Err(invalid("字段路径不能为空".to_string()));
        }
        if !self.registry.is_supported(&cond.operator) {
            return Err(invalid(format!("未知操作符 '{}'", cond.operator)));
        }

        match cond.operator.as_str() {
            "matches" => {
                let pattern = cond
                    .value
                    .as_str()
                    .ok_or_else(|| invalid("matches 操作符需要字符串正则".to_string()))?;
                regex::Regex::new(pattern)
                    .map_err(|e| invalid(format!("正则表达式无效: {}", e)))?;
            }
            "between" => {
                if range_param(&cond.value).is_none() {
                    return Err(invalid("between 需要 [min, max] 或 {min, max}".to_string()));
                }
            }
            "modulo" => {
                if modulo_param(&cond.value).is_none() {
                    return Err(invalid(
                        "modulo 需要 [divisor, remainder] 或 {divisor, remainder}".to_string(),
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// 编译决策表定义
    ///
    /// 每个单元格经 FEEL-lite 编译后合并为该行的 `All` 条件；缺省规则 ID 为 `{table_id}-r{行号}`。
    pub fn compile_table(&mut self, definition: DecisionTableDefinition) -> Result<DecisionTable> {
        let DecisionTableDefinition {
            id,
            name,
            hit_policy,
            inputs,
            outputs,
            rules,
        } = definition;

        if id.trim().is_empty() {
            return Err(RuleError::InvalidTable("决策表 ID 不能为空".to_string()));
        }
        if inputs.is_empty() {
            return Err(RuleError::InvalidTable(format!("决策表 '{}' 没有输入列", id)));
        }
        let mut output_names = HashSet::new();
        for column in &outputs {
            if !output_names.insert(column.name.as_str()) {
                return Err(RuleError::InvalidTable(format!(
                    "决策表 '{}' 输出列 '{}' 重复",
                    id, column.name
                )));
            }
        }

        let mut seen_ids = HashSet::new();
        let mut compiled_rules = Vec::with_capacity(rules.len());

        for (row_index, row) in rules.into_iter().enumerate() {
            let rule_id = row
                .id
                .unwrap_or_else(|| format!("{}-r{}", id, row_index + 1));

            if row.inputs.len() != inputs.len() || row.outputs.len() != outputs.len() {
                return Err(RuleError::InvalidTable(format!(
                    "规则 '{}' 的列数 ({} 输入, {} 输出) 与表头 ({} 输入, {} 输出) 不一致",
                    rule_id,
                    row.inputs.len(),
                    row.outputs.len(),
                    inputs.len(),
                    outputs.len()
                )));
            }
            if !seen_ids.insert(rule_id.clone()) {
                return Err(RuleError::InvalidTable(format!("规则 ID '{}' 重复", rule_id)));
            }

            let fragments = inputs
                .iter()
                .zip(&row.inputs)
                .map(|(column, cell)| compile_cell(&column.field, cell))
                .collect::<Result<Vec<_>>>()?;
            let condition = Condition::all(fragments);
            self.validate(&condition)?;

            let rule_outputs: Map<String, Value> = outputs
                .iter()
                .map(|column| column.name.clone())
                .zip(row.outputs)
                .collect();

            compiled_rules.push(Rule {
                id: rule_id,
                condition,
                outputs: rule_outputs,
                row_index,
            });
        }

        self.compile_version += 1;

        Ok(DecisionTable {
            id,
            name,
            hit_policy,
            inputs,
            outputs,
            rules: compiled_rules,
        })
    }

    /// 从 JSON 字符串编译决策表定义
    pub fn compile_table_from_json(&mut self, json: &str) -> Result<DecisionTable> {
        let definition: DecisionTableDefinition = serde_json::from_str(json)?;
        self.compile_table(definition)
    }

    pub fn compile_version(&self) -> u64 {
        self.compile_version
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// 提取条件树引用的字段路径（不含通配条件）
pub fn required_fields(condition: &Condition) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    collect_fields(condition, &mut fields);
    fields
}

fn collect_fields(node: &Condition, fields: &mut BTreeSet<String>) {
    match node {
        Condition::Field(cond) => {
            if cond.field != ALWAYS_MATCH_FIELD {
                fields.insert(cond.field.clone());
            }
        }
        Condition::All(children) | Condition::Any(children) => {
            for child in children {
                collect_fields(child, fields);
            }
        }
    }
}
