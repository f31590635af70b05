//! 决策评估引擎
//!
//! 持有五张缓存表、操作符注册表和可选的外部获取客户端。
//! 构造一次后可在多个线程间共享，`evaluate` / `resolve` 本身不持有任何调用间状态。

use crate::cache::{CacheStats, EngineCaches};
use crate::compiler::RuleCompiler;
use crate::context::{Context, EvaluationSession};
use crate::error::Result;
use crate::evaluator::ConditionEvaluator;
use crate::fetch::{FetchClient, HttpFetchClient};
use crate::models::{Condition, DecisionTable, EvaluationResult, Resolution, Rule};
use crate::operators::OperatorRegistry;
use crate::resolver::apply_hit_policy;
use chrono::{DateTime, Utc};
use decision_shared::config::AppConfig;
use std::sync::Arc;
use tracing::{info, instrument};

/// 决策评估引擎
pub struct EvaluationEngine {
    caches: EngineCaches,
    registry: Arc<OperatorRegistry>,
    fetcher: Option<Arc<dyn FetchClient>>,
}

impl EvaluationEngine {
    pub fn new() -> Self {
        Self {
            caches: EngineCaches::default(),
            registry: Arc::new(OperatorRegistry::new()),
            fetcher: None,
        }
    }

    /// 按配置构建；配置了 `engine.fetch.base_url` 时挂载 HTTP 获取客户端
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut engine = Self::new().with_caches(EngineCaches::new(config.engine.max_cache_entries));
        if let Some(client) = HttpFetchClient::from_config(&config.engine.fetch)? {
            info!(base_url = %client.base_url(), "已挂载外部数据获取客户端");
            engine = engine.with_fetcher(Arc::new(client));
        }
        Ok(engine)
    }

    pub fn with_caches(mut self, caches: EngineCaches) -> Self {
        self.caches = caches;
        self
    }

    /// 替换操作符注册表（例如追加自定义操作符族）
    pub fn with_registry(mut self, registry: OperatorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn FetchClient>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// 新建一次顶层求值会话
    pub fn session<'a>(&'a self, context: &'a Context) -> EvaluationSession<'a> {
        EvaluationSession::new(context, &self.caches).with_fetcher(self.fetcher.as_deref())
    }

    /// 求值条件树
    pub fn evaluate(&self, condition: &Condition, context: &Context) -> bool {
        let mut session = self.session(context);
        self.evaluate_with_session(condition, &mut session)
    }

    /// 在调用方提供的会话中求值，会话的覆盖层在多次调用间保留
    pub fn evaluate_with_session(&self, condition: &Condition, session: &mut EvaluationSession<'_>) -> bool {
        ConditionEvaluator::new(&self.registry).evaluate(condition, session)
    }

    /// 求值并返回评估追踪
    pub fn evaluate_traced(&self, condition: &Condition, context: &Context) -> EvaluationResult {
        let mut session = self.session(context);
        ConditionEvaluator::new(&self.registry).evaluate_traced(condition, &mut session)
    }

    /// 按表格顺序收集匹配的规则
    pub fn matching_rules<'t>(&self, table: &'t DecisionTable, context: &Context) -> Vec<&'t Rule> {
        self.matching_rules_at(table, context, Utc::now())
    }

    /// 以固定的 "now" 收集匹配的规则
    ///
    /// 每条规则在独立的会话中求值，补全结果不会从一行泄漏到另一行；
    /// 所有行共享同一个 `now`。
    pub fn matching_rules_at<'t>(
        &self,
        table: &'t DecisionTable,
        context: &Context,
        now: DateTime<Utc>,
    ) -> Vec<&'t Rule> {
        let evaluator = ConditionEvaluator::new(&self.registry);
        table
            .rules
            .iter()
            .filter(|rule| {
                let mut session = self.session(context).with_now(now);
                evaluator.evaluate(&rule.condition, &mut session)
            })
            .collect()
    }

    /// 求值决策表并应用命中策略
    pub fn resolve(&self, table: &DecisionTable, context: &Context) -> Result<Resolution> {
        self.resolve_at(table, context, Utc::now())
    }

    /// 以固定的 "now" 求值决策表
    #[instrument(skip(self, table, context), fields(table_id = %table.id, hit_policy = %table.hit_policy))]
    pub fn resolve_at(&self, table: &DecisionTable, context: &Context, now: DateTime<Utc>) -> Result<Resolution> {
        let matches = self.matching_rules_at(table, context, now);
        apply_hit_policy(table, &matches)
    }

    /// 使用本引擎注册表校验操作符的编译器
    pub fn compiler(&self) -> RuleCompiler {
        RuleCompiler::with_registry(Arc::clone(&self.registry))
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn caches(&self) -> &EngineCaches {
        &self.caches
    }

    pub fn has_fetcher(&self) -> bool {
        self.fetcher.is_some()
    }

    /// 清空全部缓存
    pub fn clear_caches(&self) {
        self.caches.clear_all();
    }

    pub fn cache_sizes(&self) -> CacheStats {
        self.caches.sizes()
    }

    pub fn cache_computations(&self) -> CacheStats {
        self.caches.computations()
    }
}

impl Default for EvaluationEngine {
    fn default() -> Self {
        Self::new()
    }
}
