//! 外部数据获取客户端
//!
//! `fetch_from_api` 操作符通过 `FetchClient` 访问外部数据；
//! 核心只依赖 trait，HTTP 实现基于 reqwest 阻塞客户端。

use crate::error::{Result, RuleError};
use decision_shared::config::FetchConfig;
use decision_shared::retry::{RetryPolicy, retry_with_policy};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// 外部数据获取能力
///
/// 调用是阻塞的；超时与重试由实现方负责。
#[cfg_attr(test, mockall::automock)]
pub trait FetchClient: Send + Sync {
    fn fetch(&self, endpoint: &str, params: &Map<String, Value>) -> Result<Value>;
}

/// 单次请求的失败原因，用于区分是否可重试
#[derive(Debug)]
enum AttemptError {
    Transport(reqwest::Error),
    Status(StatusCode),
    Decode(reqwest::Error),
}

impl AttemptError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status(status) => status.is_server_error(),
            Self::Decode(_) => false,
        }
    }
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "请求发送失败: {e}"),
            Self::Status(status) => write!(f, "返回 HTTP {status}"),
            Self::Decode(e) => write!(f, "响应体不是有效 JSON: {e}"),
        }
    }
}

/// 基于 HTTP GET 的获取客户端
///
/// 请求 `{base_url}{endpoint}`，参数作为查询字符串，响应体按 JSON 解析。
pub struct HttpFetchClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpFetchClient {
    pub fn new(base_url: impl Into<String>, client: Client, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// 从配置构建；未配置 base_url 时返回 None
    pub fn from_config(config: &FetchConfig) -> Result<Option<Self>> {
        let Some(base_url) = config.base_url.as_deref() else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RuleError::Fetch(format!("创建 HTTP 客户端失败: {e}")))?;
        let retry = RetryPolicy {
            max_retries: config.max_retries,
            initial_delay: config.initial_backoff(),
            ..RetryPolicy::default()
        };
        Ok(Some(Self::new(base_url, client, retry)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    fn send_once(&self, url: &str, query: &[(String, String)]) -> std::result::Result<Value, AttemptError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }
        response.json::<Value>().map_err(AttemptError::Decode)
    }
}

impl FetchClient for HttpFetchClient {
    fn fetch(&self, endpoint: &str, params: &Map<String, Value>) -> Result<Value> {
        let url = self.url_for(endpoint);
        let query = query_pairs(params);
        debug!(url = %url, params = query.len(), "发起外部数据请求");

        retry_with_policy(&self.retry, "fetch_from_api", AttemptError::is_retryable, || {
            self.send_once(&url, &query)
        })
        .map_err(|e| RuleError::Fetch(format!("{url}: {e}")))
    }
}

/// 参数转查询字符串；字符串原样，null 跳过，其余取 JSON 文本
fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs() {
        let params = json!({"uid": "u-1", "limit": 10, "vip": true, "skip": null});
        let pairs = query_pairs(params.as_object().unwrap());
        assert_eq!(
            pairs,
            vec![
                ("uid".to_string(), "u-1".to_string()),
                ("limit".to_string(), "10".to_string()),
                ("vip".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn test_from_config_without_base_url() {
        let config = FetchConfig::default();
        assert!(HttpFetchClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_url_joining() {
        let config = FetchConfig {
            base_url: Some("http://risk.internal/".into()),
            ..FetchConfig::default()
        };
        let client = HttpFetchClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.base_url(), "http://risk.internal");
        assert_eq!(client.url_for("/score"), "http://risk.internal/score");
        assert_eq!(client.url_for("score"), "http://risk.internal/score");
        assert_eq!(client.url_for("https://other/x"), "https://other/x");
    }

    #[test]
    fn test_unreachable_host_is_fetch_error() {
        let config = FetchConfig {
            base_url: Some("http://127.0.0.1:9".into()),
            timeout_ms: 200,
            max_retries: 0,
            ..FetchConfig::default()
        };
        let client = HttpFetchClient::from_config(&config).unwrap().unwrap();
        let err = client.fetch("/x", &Map::new()).unwrap_err();
        assert_eq!(err.code(), "FETCH_FAILED");
    }

    #[test]
    fn test_status_retry_classification() {
        assert!(AttemptError::Status(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!AttemptError::Status(StatusCode::NOT_FOUND).is_retryable());
    }
}
