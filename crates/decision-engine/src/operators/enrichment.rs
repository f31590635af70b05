//! 数据补全操作符：fetch_from_api
//!
//! 唯一带副作用的操作符。参数中的 `{{field.path}}` 模板从当前会话取值，
//! 调用外部获取客户端，再把映射后的响应字段写入会话覆盖层。
//! 覆盖层只对本次求值可见。

use super::OperatorFamily;
use crate::context::EvaluationSession;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;

const TEMPLATE_PATTERN: &str = r"\{\{\s*([^{}]+?)\s*\}\}";

/// 模板占位符的正则，不进入规则使用的正则缓存
static TEMPLATE: OnceLock<Option<Regex>> = OnceLock::new();

fn template_regex() -> Option<&'static Regex> {
    TEMPLATE.get_or_init(|| Regex::new(TEMPLATE_PATTERN).ok()).as_ref()
}

pub struct EnrichmentOperators;

impl OperatorFamily for EnrichmentOperators {
    fn name(&self) -> &'static str {
        "enrichment"
    }

    fn operators(&self) -> &'static [&'static str] {
        &["fetch_from_api"]
    }

    fn evaluate(
        &self,
        operator: &str,
        _actual: &Value,
        expected: &Value,
        session: &mut EvaluationSession<'_>,
    ) -> Option<bool> {
        (operator == "fetch_from_api").then(|| fetch_from_api(expected, session))
    }
}

fn fetch_from_api(expected: &Value, session: &mut EvaluationSession<'_>) -> bool {
    let Some(spec) = expected.as_object() else {
        debug!("fetch_from_api 参数不是对象");
        return false;
    };
    let Some(endpoint) = spec.get("endpoint").and_then(Value::as_str) else {
        debug!("fetch_from_api 缺少 endpoint");
        return false;
    };
    let Some(fetcher) = session.fetcher() else {
        debug!(endpoint, "未配置获取客户端，补全失败");
        return false;
    };
    let Some(template) = template_regex() else {
        return false;
    };

    let endpoint = render_string(endpoint, template, session);
    let mut params = Map::new();
    if let Some(raw) = spec.get("params").and_then(Value::as_object) {
        for (key, value) in raw {
            params.insert(key.clone(), render_value(value, template, session));
        }
    }

    let response = match fetcher.fetch(&endpoint, &params) {
        Ok(response) => response,
        Err(e) => {
            debug!(endpoint = %endpoint, error = %e, "数据补全请求失败");
            return false;
        }
    };

    match spec.get("mapping").and_then(Value::as_object) {
        Some(mapping) => {
            let mut mapped = 0usize;
            for (target, source) in mapping {
                let value = source.as_str().and_then(|path| value_at(&response, path));
                if let Some(value) = value {
                    session.enrich(target.clone(), value.clone());
                    mapped += 1;
                }
            }
            debug!(endpoint = %endpoint, mapped, "数据补全完成");
            mapped > 0
        }
        None => {
            if let Value::Object(fields) = response {
                for (key, value) in fields {
                    session.enrich(key, value);
                }
            }
            true
        }
    }
}

/// 恰好是一个 `{{path}}` 的字符串保留原始值，其余字符串按文本替换
fn render_value(value: &Value, template: &Regex, session: &EvaluationSession<'_>) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    if let Some(caps) = template.captures(text) {
        if caps.get(0).is_some_and(|whole| whole.as_str().len() == text.len()) {
            return session
                .lookup(&caps[1])
                .map(|v| v.into_owned())
                .unwrap_or(Value::Null);
        }
    }
    Value::String(render_string(text, template, session))
}

fn render_string(text: &str, template: &Regex, session: &EvaluationSession<'_>) -> String {
    template
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match session.lookup(&caps[1]).as_deref() {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            }
        })
        .into_owned()
}

/// 响应体中的点号路径
fn value_at<'v>(response: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.').try_fold(response, |current, key| match current {
        Value::Object(map) => map.get(key),
        _ => None,
    })
}
