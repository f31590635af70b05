//! 决策表存储
//!
//! 使用 DashMap 缓存编译后的决策表，支持加载、删除、批量加载，并可按 ID 直接求值。
//! 只是跨请求复用编译结果的内存缓存，不负责持久化。

use crate::compiler::RuleCompiler;
use crate::context::Context;
use crate::engine::EvaluationEngine;
use crate::error::{Result, RuleError};
use crate::models::{DecisionTable, DecisionTableDefinition, Resolution};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 决策表存储
#[derive(Clone)]
pub struct TableStore {
    tables: Arc<DashMap<String, Arc<DecisionTable>>>,
    compiler: Arc<Mutex<RuleCompiler>>,
    engine: Arc<EvaluationEngine>,
}

impl TableStore {
    pub fn new(engine: Arc<EvaluationEngine>) -> Self {
        Self {
            tables: Arc::new(DashMap::new()),
            compiler: Arc::new(Mutex::new(engine.compiler())),
            engine,
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// 加载决策表定义，同 ID 的旧表被替换
    #[instrument(skip(self, definition), fields(table_id = %definition.id))]
    pub fn load(&self, definition: DecisionTableDefinition) -> Result<String> {
        let table = {
            let mut compiler = self.compiler.lock();
            compiler.compile_table(definition)?
        };
        Ok(self.insert(table))
    }

    /// 加载决策表（从 JSON 字符串）
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<String> {
        let definition: DecisionTableDefinition = serde_json::from_str(json)?;
        self.load(definition)
    }

    /// 直接放入已编译的决策表
    pub fn insert(&self, table: DecisionTable) -> String {
        let table_id = table.id.clone();
        let rules = table.rules.len();
        if self.tables.insert(table_id.clone(), Arc::new(table)).is_some() {
            info!(table_id = %table_id, rules, "决策表已替换");
        } else {
            info!(table_id = %table_id, rules, "决策表已加载");
        }
        table_id
    }

    /// 批量加载，失败的定义记录日志后跳过
    #[instrument(skip(self, definitions))]
    pub fn load_batch(&self, definitions: Vec<DecisionTableDefinition>) -> Vec<String> {
        let mut loaded_ids = Vec::with_capacity(definitions.len());
        let mut failed = 0usize;

        for definition in definitions {
            let table_id = definition.id.clone();
            match self.load(definition) {
                Ok(id) => loaded_ids.push(id),
                Err(e) => {
                    warn!(table_id = %table_id, error = %e, "决策表加载失败");
                    failed += 1;
                }
            }
        }

        info!("批量加载完成: {} 成功, {} 失败", loaded_ids.len(), failed);
        loaded_ids
    }

    #[instrument(skip(self))]
    pub fn delete(&self, table_id: &str) -> Result<()> {
        if self.tables.remove(table_id).is_some() {
            info!("决策表已删除: {}", table_id);
            Ok(())
        } else {
            warn!("删除不存在的决策表: {}", table_id);
            Err(RuleError::TableNotFound(table_id.to_string()))
        }
    }

    pub fn get(&self, table_id: &str) -> Option<Arc<DecisionTable>> {
        self.tables.get(table_id).map(|t| Arc::clone(t.value()))
    }

    pub fn contains(&self, table_id: &str) -> bool {
        self.tables.contains_key(table_id)
    }

    /// 所有决策表 ID（已排序）
    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.iter().map(|t| t.key().clone()).collect();
        ids.sort();
        ids
    }

    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.tables.len();
        self.tables.clear();
        info!("已清空 {} 张决策表", count);
    }

    /// 按 ID 求值决策表
    pub fn resolve(&self, table_id: &str, context: &Context) -> Result<Resolution> {
        let table = self
            .get(table_id)
            .ok_or_else(|| RuleError::TableNotFound(table_id.to_string()))?;
        self.engine.resolve(&table, context)
    }

    pub fn engine(&self) -> &EvaluationEngine {
        &self.engine
    }

    pub fn stats(&self) -> TableStoreStats {
        let tables_count = self.tables.len();
        let total_rules: usize = self.tables.iter().map(|t| t.rules.len()).sum();

        TableStoreStats {
            tables_count,
            total_rules,
            avg_rules_per_table: if tables_count > 0 {
                total_rules as f64 / tables_count as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new(Arc::new(EvaluationEngine::new()))
    }
}

/// 决策表存储统计信息
#[derive(Debug, Clone)]
pub struct TableStoreStats {
    pub tables_count: usize,
    pub total_rules: usize,
    pub avg_rules_per_table: f64,
}
