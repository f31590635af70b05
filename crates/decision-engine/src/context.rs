//! 求值上下文与单次求值会话
//!
//! `Context` 是只读的输入记录，构造后可在线程间共享。
//! `EvaluationSession` 只属于一次顶层求值调用，携带数据补全操作写入的覆盖层。

use crate::cache::EngineCaches;
use crate::fetch::FetchClient;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::sync::Arc;

/// 求值上下文 - 提供给决策引擎的数据
#[derive(Debug, Clone, Default)]
pub struct Context {
    data: Arc<Map<String, Value>>,
}

impl Context {
    /// 从 JSON 值创建，非对象值视为空上下文
    pub fn new(data: Value) -> Self {
        match data {
            Value::Object(map) => Self::from_map(map),
            other => {
                tracing::debug!(kind = %crate::operators::type_name(&other), "上下文不是对象，按空上下文处理");
                Self::default()
            }
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self { data: Arc::new(map) }
    }

    /// 从 JSON 字符串创建
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let data: Value = serde_json::from_str(json)?;
        Ok(Self::new(data))
    }

    /// 获取字段值（点号分隔的路径，如 "user.profile.age"）
    ///
    /// 中间节点缺失、不是对象或为 null 时返回 None，最终值为 null 也返回 None。
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let (first, rest) = parts.split_first()?;
        descend(self.data.get(*first)?, rest.iter().copied())
    }

    fn get_parts(&self, parts: &[String]) -> Option<&Value> {
        let (first, rest) = parts.split_first()?;
        descend(self.data.get(first.as_str())?, rest.iter().map(String::as_str))
    }

    /// 获取底层数据
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

fn descend<'v, 'p>(root: &'v Value, rest: impl Iterator<Item = &'p str>) -> Option<&'v Value> {
    let mut current = root;
    for part in rest {
        match current {
            Value::Object(map) => current = map.get(part)?,
            _ => return None,
        }
    }
    match current {
        Value::Null => None,
        value => Some(value),
    }
}

/// 单次顶层求值的会话
///
/// 同一次求值中的兄弟条件和嵌套子树共享覆盖层；会话结束即丢弃，
/// 不会在两次顶层调用之间泄漏，也不会跨线程共享。
pub struct EvaluationSession<'a> {
    context: &'a Context,
    caches: &'a EngineCaches,
    fetcher: Option<&'a dyn FetchClient>,
    overlay: Map<String, Value>,
    now: DateTime<Utc>,
}

impl<'a> EvaluationSession<'a> {
    pub fn new(context: &'a Context, caches: &'a EngineCaches) -> Self {
        Self {
            context,
            caches,
            fetcher: None,
            overlay: Map::new(),
            now: Utc::now(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Option<&'a dyn FetchClient>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// 固定 "now" 的取值
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// 按路径取值，覆盖层中的顶层键优先于原始上下文
    ///
    /// 原始上下文中的值以借用返回；覆盖层中的值会被克隆。
    pub fn lookup(&self, path: &str) -> Option<Cow<'a, Value>> {
        let parts = self.caches.split_path(path);
        let (first, rest) = parts.split_first()?;

        if let Some(root) = self.overlay.get(first.as_str()) {
            return descend(root, rest.iter().map(String::as_str)).map(|v| Cow::Owned(v.clone()));
        }

        let context: &'a Context = self.context;
        context.get_parts(&parts).map(Cow::Borrowed)
    }

    /// 写入覆盖层（仅对本次求值可见）
    pub fn enrich(&mut self, key: impl Into<String>, value: Value) {
        self.overlay.insert(key.into(), value);
    }

    pub fn overlay(&self) -> &Map<String, Value> {
        &self.overlay
    }

    pub fn context(&self) -> &'a Context {
        self.context
    }

    pub fn caches(&self) -> &'a EngineCaches {
        self.caches
    }

    pub fn fetcher(&self) -> Option<&'a dyn FetchClient> {
        self.fetcher
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
