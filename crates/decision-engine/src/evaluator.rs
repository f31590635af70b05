//! 条件树求值器
//!
//! 递归求值 `Condition`：`All` 遇 false 短路，`Any` 遇 true 短路，
//! 字段条件交给操作符注册表分发。可选记录评估追踪，便于排查规则。

use crate::context::EvaluationSession;
use crate::models::{Condition, EvaluationResult, FieldCondition};
use crate::operators::OperatorRegistry;
use serde_json::Value;
use std::time::Instant;
use tracing::trace;

/// 条件求值器
pub struct ConditionEvaluator<'r> {
    registry: &'r OperatorRegistry,
}

impl<'r> ConditionEvaluator<'r> {
    pub fn new(registry: &'r OperatorRegistry) -> Self {
        Self { registry }
    }

    /// 求值条件树，同一会话内的兄弟节点共享补全覆盖层
    pub fn evaluate(&self, condition: &Condition, session: &mut EvaluationSession<'_>) -> bool {
        self.evaluate_node(condition, session, None, "root")
    }

    /// 求值并记录每个访问节点与短路位置
    pub fn evaluate_traced(
        &self,
        condition: &Condition,
        session: &mut EvaluationSession<'_>,
    ) -> EvaluationResult {
        let start = Instant::now();
        let mut result = EvaluationResult::new();

        let matched = self.evaluate_node(condition, session, Some(&mut result), "root");
        result.matched = matched;
        result.evaluation_time_us = start.elapsed().as_micros() as u64;
        result
    }

    fn evaluate_node(
        &self,
        node: &Condition,
        session: &mut EvaluationSession<'_>,
        trace: Option<&mut EvaluationResult>,
        path: &str,
    ) -> bool {
        match node {
            Condition::Field(cond) => self.evaluate_field(cond, session, trace, path),
            Condition::All(children) => self.evaluate_group(true, children, session, trace, path),
            Condition::Any(children) => self.evaluate_group(false, children, session, trace, path),
        }
    }

    fn evaluate_field(
        &self,
        cond: &FieldCondition,
        session: &mut EvaluationSession<'_>,
        trace: Option<&mut EvaluationResult>,
        path: &str,
    ) -> bool {
        let matched = if cond.is_always_match() {
            true
        } else {
            let actual = session.lookup(&cond.field);
            let actual = actual.as_deref().unwrap_or(&Value::Null);
            self.registry
                .dispatch(&cond.operator, actual, &cond.value, session)
        };

        trace!(path, condition = %cond, matched, "条件求值");

        if let Some(result) = trace {
            result.evaluation_trace.push(format!(
                "{}: {} => {}",
                path,
                cond,
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
            if matched {
                result.matched_conditions.push(format!("{}: {}", path, cond));
            }
        }

        matched
    }

    /// `is_all` 为 true 时按 All 语义，否则按 Any 语义
    fn evaluate_group(
        &self,
        is_all: bool,
        children: &[Condition],
        session: &mut EvaluationSession<'_>,
        mut trace: Option<&mut EvaluationResult>,
        path: &str,
    ) -> bool {
        let label = if is_all { "ALL" } else { "ANY" };
        if let Some(result) = trace.as_deref_mut() {
            result.evaluation_trace.push(format!(
                "{}: 开始评估 {} 组 (共 {} 个子节点)",
                path,
                label,
                children.len()
            ));
        }

        for (i, child) in children.iter().enumerate() {
            let child_path = format!("{}.{}[{}]", path, label.to_lowercase(), i);
            let child_matched = self.evaluate_node(child, session, trace.as_deref_mut(), &child_path);

            // All 遇 false、Any 遇 true 即短路
            if child_matched != is_all {
                if let Some(result) = trace.as_deref_mut() {
                    result
                        .evaluation_trace
                        .push(format!("{}: {} 短路 - 子节点 {}", path, label, i));
                }
                return child_matched;
            }
        }

        if let Some(result) = trace {
            let summary = if is_all { "全部匹配" } else { "无匹配" };
            result
                .evaluation_trace
                .push(format!("{}: {} 组{}", path, label, summary));
        }
        is_all
    }
}
