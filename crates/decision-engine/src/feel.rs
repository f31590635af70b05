//! FEEL-lite 单元格编译器
//!
//! 把决策表单元格文本编译成绑定到该列输入字段的条件片段。
//!
//! 支持的写法：
//! - 通配：`-` 或空单元格
//! - 比较：`>= N`、`> N`、`<= N`、`< N`、`= N`、`!= N`
//! - 区间：`[a..b]`、`[a..b)`、`(a..b]`、`(a..b)`
//! - 字面量：数字、带引号的字符串、`true` / `false` / `null`、不带引号的单词
//! - 列表：`"a","b"`、`1,2,3`，编译为 `in`

use crate::error::{Result, RuleError};
use crate::models::Condition;
use serde_json::{Number, Value};

/// 比较前缀，长前缀在前
const COMPARISONS: [(&str, &str); 6] = [
    (">=", "gte"),
    ("<=", "lte"),
    ("!=", "neq"),
    (">", "gt"),
    ("<", "lt"),
    ("=", "eq"),
];

/// 编译单元格文本
pub fn compile_cell(field: &str, text: &str) -> Result<Condition> {
    let cell = text.trim();
    if cell.is_empty() || cell == "-" {
        return Ok(Condition::always_match());
    }

    if let Some(range) = compile_range(field, cell)? {
        return Ok(range);
    }

    for (prefix, operator) in COMPARISONS {
        if let Some(operand) = cell.strip_prefix(prefix) {
            let operand = operand.trim();
            let value = if matches!(operator, "eq" | "neq") {
                parse_literal(operand)
            } else {
                parse_operand(operand)
            };
            let value = value.ok_or_else(|| syntax(text, "比较操作数必须是数字或带引号的字符串"))?;
            return Ok(Condition::field(field, operator, value));
        }
    }

    let items = split_list(cell).ok_or_else(|| syntax(text, "引号不匹配"))?;
    if items.len() > 1 {
        let values = items
            .iter()
            .map(|item| parse_literal(item))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| syntax(text, "列表元素必须是字面量"))?;
        return Ok(Condition::field(field, "in", Value::Array(values)));
    }

    parse_literal(cell)
        .map(|value| Condition::field(field, "eq", value))
        .ok_or_else(|| syntax(text, "无法识别的表达式"))
}

fn syntax(cell: &str, reason: &str) -> RuleError {
    RuleError::FeelSyntax {
        cell: cell.to_string(),
        reason: reason.to_string(),
    }
}

/// 区间写法；不是区间形状时返回 Ok(None)
fn compile_range(field: &str, cell: &str) -> Result<Option<Condition>> {
    let lower_op = match cell.chars().next() {
        Some('[') => "gte",
        Some('(') => "gt",
        _ => return Ok(None),
    };
    let upper_op = match cell.chars().last() {
        Some(']') => "lte",
        Some(')') => "lt",
        _ => return Ok(None),
    };
    let body = &cell[1..cell.len() - 1];
    let (low, high) = body
        .split_once("..")
        .ok_or_else(|| syntax(cell, "区间缺少 '..' 分隔符"))?;
    let low = parse_operand(low.trim()).ok_or_else(|| syntax(cell, "区间下界无效"))?;
    let high = parse_operand(high.trim()).ok_or_else(|| syntax(cell, "区间上界无效"))?;

    if let (Some(a), Some(b)) = (low.as_f64(), high.as_f64()) {
        if a > b {
            return Err(syntax(cell, "区间下界大于上界"));
        }
    } else if low.is_number() != high.is_number() {
        return Err(syntax(cell, "区间上下界类型不一致"));
    }

    Ok(Some(Condition::all(vec![
        Condition::field(field, lower_op, low),
        Condition::field(field, upper_op, high),
    ])))
}

/// 比较与区间的操作数：数字或带引号的字符串
fn parse_operand(text: &str) -> Option<Value> {
    parse_number(text).or_else(|| parse_quoted(text).map(Value::String))
}

/// 单元格字面量，不带引号的单词按字符串处理
fn parse_literal(text: &str) -> Option<Value> {
    match text {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    if let Some(value) = parse_operand(text) {
        return Some(value);
    }
    is_bare_word(text).then(|| Value::String(text.to_string()))
}

fn parse_number(text: &str) -> Option<Value> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '+' || first == '.') {
        return None;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Some(Value::from(n));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn parse_quoted(text: &str) -> Option<String> {
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = text.strip_prefix(quote)?.strip_suffix(quote)?;
    (!inner.contains(quote)).then(|| inner.to_string())
}

fn is_bare_word(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/' | '@'))
}

/// 按逗号切分，忽略引号内的逗号；引号未闭合返回 None
fn split_list(text: &str) -> Option<Vec<&str>> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                items.push(text[start..i].trim());
                start = i + 1;
            }
            (None, _) => {}
        }
    }
    if quote.is_some() {
        return None;
    }
    items.push(text[start..].trim());
    Some(items)
}
