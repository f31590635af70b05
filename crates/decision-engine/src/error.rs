//! 决策引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    // ==================== 模型定义错误（由规则作者修复） ====================
    #[error("决策表 '{table}' 覆盖缺口: 没有任何规则匹配")]
    CoverageGap { table: String },

    #[error("决策表 '{table}' 匹配歧义: 规则 {rule_ids:?} 同时匹配")]
    AmbiguousMatch { table: String, rule_ids: Vec<String> },

    #[error("决策表 '{table}' 输出冲突: 规则 {rule_ids:?} 的输出不一致")]
    ConflictingOutput { table: String, rule_ids: Vec<String> },

    // ==================== 编译与校验错误 ====================
    #[error("FEEL 表达式 '{cell}' 无法解析: {reason}")]
    FeelSyntax { cell: String, reason: String },

    #[error("无效的决策表: {0}")]
    InvalidTable(String),

    #[error("条件 '{path}' 无效: {reason}")]
    InvalidCondition { path: String, reason: String },

    #[error("决策表未找到: {0}")]
    TableNotFound(String),

    // ==================== 外部数据拉取 ====================
    #[error("外部数据拉取失败: {0}")]
    Fetch(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl RuleError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::CoverageGap { .. } => "COVERAGE_GAP",
            Self::AmbiguousMatch { .. } => "AMBIGUOUS_MATCH",
            Self::ConflictingOutput { .. } => "CONFLICTING_OUTPUT",
            Self::FeelSyntax { .. } => "FEEL_SYNTAX",
            Self::InvalidTable(_) => "INVALID_TABLE",
            Self::InvalidCondition { .. } => "INVALID_CONDITION",
            Self::TableNotFound(_) => "TABLE_NOT_FOUND",
            Self::Fetch(_) => "FETCH_FAILED",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// 是否为决策表模型定义错误
    ///
    /// 这类错误表示表格本身需要修正，而不是运行时故障。
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            Self::CoverageGap { .. } | Self::AmbiguousMatch { .. } | Self::ConflictingOutput { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_classification() {
        let gap = RuleError::CoverageGap {
            table: "risk".to_string(),
        };
        let ambiguous = RuleError::AmbiguousMatch {
            table: "risk".to_string(),
            rule_ids: vec!["r1".to_string(), "r2".to_string()],
        };
        let syntax = RuleError::FeelSyntax {
            cell: "[1..".to_string(),
            reason: "缺少右边界".to_string(),
        };

        assert!(gap.is_model_error());
        assert!(ambiguous.is_model_error());
        assert!(!syntax.is_model_error());
        assert_eq!(gap.code(), "COVERAGE_GAP");
        assert!(ambiguous.to_string().contains("r2"));
    }
}
