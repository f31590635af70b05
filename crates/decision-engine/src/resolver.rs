//! 命中策略解析
//!
//! 输入是按表格顺序收集的匹配规则集合，输出主决策或模型错误。
//! 解析本身不做求值，方便单独测试每种策略。

use crate::error::{Result, RuleError};
use crate::models::{Decision, DecisionTable, HitPolicy, Resolution, Rule};
use crate::operators::values_equal;
use serde_json::{Map, Value};
use tracing::debug;

/// 对匹配集合应用表格的命中策略
///
/// `matches` 必须保持表格顺序。
pub fn apply_hit_policy(table: &DecisionTable, matches: &[&Rule]) -> Result<Resolution> {
    let rule_ids = || matches.iter().map(|rule| rule.id.clone()).collect::<Vec<_>>();

    let primary = match table.hit_policy {
        HitPolicy::First | HitPolicy::Priority | HitPolicy::Collect => match matches.first() {
            Some(rule) => *rule,
            None => return Ok(Resolution::NoMatch),
        },
        HitPolicy::Unique => match matches {
            [] => {
                return Err(RuleError::CoverageGap {
                    table: table.id.clone(),
                });
            }
            [only] => *only,
            _ => {
                return Err(RuleError::AmbiguousMatch {
                    table: table.id.clone(),
                    rule_ids: rule_ids(),
                });
            }
        },
        HitPolicy::Any => {
            let Some((first, rest)) = matches.split_first() else {
                return Ok(Resolution::NoMatch);
            };
            if rest.iter().any(|rule| !outputs_equal(&rule.outputs, &first.outputs)) {
                return Err(RuleError::ConflictingOutput {
                    table: table.id.clone(),
                    rule_ids: rule_ids(),
                });
            }
            *first
        }
    };

    let confidence = match table.hit_policy {
        HitPolicy::Collect => {
            let agreeing = matches
                .iter()
                .filter(|rule| outputs_equal(&rule.outputs, &primary.outputs))
                .count();
            agreeing as f64 / matches.len() as f64
        }
        _ => 1.0,
    };

    debug!(
        table = %table.id,
        hit_policy = %table.hit_policy,
        rule_id = %primary.id,
        match_count = matches.len(),
        "决策表命中"
    );

    Ok(Resolution::Decided(Decision {
        hit_policy: table.hit_policy,
        rule_id: primary.id.clone(),
        outputs: primary.outputs.clone(),
        matched_rule_ids: rule_ids(),
        matched_outputs: matches.iter().map(|rule| rule.outputs.clone()).collect(),
        match_count: matches.len(),
        confidence,
    }))
}

/// 输出集合按值比较，数字 1 与 1.0 视为相同
pub fn outputs_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| values_equal(value, other)))
}
