//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 外部数据拉取配置（供 fetch_from_api 操作符使用）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// 外部数据服务根地址，为空时不挂载拉取客户端
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 5000,
            max_retries: 2,
            initial_backoff_ms: 100,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

/// 评估引擎配置
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 每张缓存表的最大条目数，0 表示不限制
    ///
    /// 达到上限时该表会在下一次插入前整体清空。
    pub max_cache_entries: usize,
    pub fetch: FetchConfig,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 是否输出 JSON 格式（结构化）日志
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（DECISION_ 前缀，如 DECISION_ENGINE__FETCH__BASE_URL -> engine.fetch.base_url）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("DECISION_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from_dir(service_name, &env, Path::new(&config_dir))
    }

    /// 从指定目录加载配置
    pub fn load_from_dir(
        service_name: &str,
        env: &str,
        config_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("DECISION")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine.max_cache_entries, 0);
        assert_eq!(config.engine.fetch.timeout(), Duration::from_millis(5000));
        assert!(config.engine.fetch.base_url.is_none());
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_load_without_files_uses_defaults() {
        let dir = std::env::temp_dir().join("decision-shared-empty-config");
        let config = AppConfig::load_from_dir("decision-engine", "test", &dir).unwrap();

        assert_eq!(config.service_name, "decision-engine");
        assert_eq!(config.environment, "test");
        assert_eq!(config.engine.fetch.max_retries, 2);
        assert!(!config.is_production());
    }

    #[test]
    fn test_load_layers_service_file_over_default() {
        let dir = std::env::temp_dir().join(format!("decision-shared-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("default.toml"),
            "[engine]\nmax_cache_entries = 100\n[engine.fetch]\ntimeout_ms = 800\n",
        )
        .unwrap();
        fs::write(
            dir.join("decision-engine.toml"),
            "[engine]\nmax_cache_entries = 500\n[observability]\njson_logs = true\n",
        )
        .unwrap();

        let config = AppConfig::load_from_dir("decision-engine", "test", &dir).unwrap();
        fs::remove_dir_all(&dir).ok();

        assert_eq!(config.engine.max_cache_entries, 500);
        assert_eq!(config.engine.fetch.timeout_ms, 800);
        assert!(config.observability.json_logs);
    }
}
