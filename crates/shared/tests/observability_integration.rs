//! 日志初始化集成测试
//!
//! 独立的测试二进制，全局订阅器只会在这里安装一次。

use decision_shared::config::{AppConfig, ObservabilityConfig};
use decision_shared::observability;
use decision_shared::retry::{RetryPolicy, retry_with_policy};
use std::time::Duration;

#[test]
fn test_json_logging_init_and_retry_logs() {
    let config = ObservabilityConfig {
        log_level: "debug".to_string(),
        json_logs: true,
    };
    observability::init(&config).unwrap();

    // 第二次安装全局订阅器失败
    assert!(observability::init(&config).is_err());
    // 测试订阅器在已安装时静默跳过
    observability::init_for_tests();

    let policy = RetryPolicy {
        max_retries: 1,
        initial_delay: Duration::from_millis(1),
        ..RetryPolicy::default()
    };
    let mut calls = 0;
    let result: Result<u32, String> = retry_with_policy(&policy, "flaky", |_| true, || {
        calls += 1;
        if calls == 1 { Err("boom".to_string()) } else { Ok(7) }
    });
    assert_eq!(result, Ok(7));
    assert_eq!(calls, 2);
}

#[test]
fn test_default_app_config_has_sane_observability() {
    let config = AppConfig::default();
    assert_eq!(config.observability.log_level, "info");
    assert!(!config.observability.json_logs);
}
