//! 决策评估引擎
//!
//! 提供可复用的条件求值与决策表能力，支持：
//! - JSON 条件树定义、校验和求值
//! - 可扩展的操作符族与线程安全的缓存
//! - FEEL-lite 决策表单元格编译
//! - FIRST / UNIQUE / PRIORITY / ANY / COLLECT 命中策略

pub mod cache;
pub mod compiler;
pub mod context;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod feel;
pub mod fetch;
pub mod models;
pub mod operators;
pub mod resolver;
pub mod store;

pub use cache::{CacheStats, EngineCaches};
pub use compiler::{CompiledCondition, RuleCompiler};
pub use context::{Context, EvaluationSession};
pub use engine::EvaluationEngine;
pub use error::{Result, RuleError};
pub use evaluator::ConditionEvaluator;
pub use feel::compile_cell;
pub use fetch::{FetchClient, HttpFetchClient};
pub use models::{
    Condition, Decision, DecisionTable, DecisionTableDefinition, EvaluationResult, FieldCondition,
    HitPolicy, InputColumn, OutputColumn, Resolution, Rule, RuleDefinition,
};
pub use operators::{OperatorFamily, OperatorRegistry};
pub use store::{TableStore, TableStoreStats};
