use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::RetryPolicy;

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,

    // Sinks (미설정 시 해당 싱크는 비활성화)
    pub archive_dir: Option<PathBuf>,
    pub search_url: Option<String>,
    pub search_index: String,

    // Bus
    pub bus_topic_events: String,
    pub bus_topic_alerts: String,
    pub bus_capacity: usize,

    // Notification
    pub discord_webhook_url: Option<String>,

    // Storage (미설정 시 인메모리)
    pub database_url: Option<String>,
    pub dlq_dir: Option<PathBuf>,

    // Pipeline
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub worker_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            archive_dir: None,
            search_url: None,
            search_index: "datapulse-events".to_string(),
            bus_topic_events: "datapulse-events".to_string(),
            bus_topic_alerts: "datapulse-alerts".to_string(),
            bus_capacity: 1024,
            discord_webhook_url: None,
            database_url: None,
            dlq_dir: None,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            worker_concurrency: 16,
        }
    }
}

impl AppConfig {
    /// 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 키 조회 함수로부터 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_port = match get("SERVER_PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidPort(v))?,
            None => defaults.server_port,
        };

        let max_attempts: u32 = parse_number(&get, "PIPELINE_MAX_ATTEMPTS", defaults.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "PIPELINE_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        let initial_backoff_ms = parse_number(
            &get,
            "PIPELINE_INITIAL_BACKOFF_MS",
            defaults.initial_backoff.as_millis() as u64,
        )?;
        let max_backoff_ms = parse_number(
            &get,
            "PIPELINE_MAX_BACKOFF_MS",
            defaults.max_backoff.as_millis() as u64,
        )?;

        let search_url = get("SEARCH_URL");
        let database_url = get("DATABASE_URL");
        let discord_webhook_url = get("DISCORD_WEBHOOK_URL");

        if search_url.is_none() {
            tracing::info!("SEARCH_URL 환경변수가 설정되지 않았습니다. 검색 인덱싱을 건너뜁니다.");
        }
        if database_url.is_none() {
            tracing::warn!(
                "DATABASE_URL 환경변수가 설정되지 않았습니다. 알림 정의는 인메모리에만 저장됩니다."
            );
        }

        Ok(Self {
            server_port,
            archive_dir: get("ARCHIVE_DIR").map(PathBuf::from),
            search_url,
            search_index: get("SEARCH_INDEX").unwrap_or(defaults.search_index),
            bus_topic_events: get("BUS_TOPIC_EVENTS").unwrap_or(defaults.bus_topic_events),
            bus_topic_alerts: get("BUS_TOPIC_ALERTS").unwrap_or(defaults.bus_topic_alerts),
            bus_capacity: parse_number(&get, "BUS_CAPACITY", defaults.bus_capacity)?,
            discord_webhook_url,
            database_url,
            dlq_dir: get("DLQ_DIR").map(PathBuf::from),
            max_attempts,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
            worker_concurrency: parse_number(&get, "WORKER_CONCURRENCY", defaults.worker_concurrency)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            ..Default::default()
        }
    }
}

fn parse_number<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn should_use_defaults_when_unset() {
        // Act
        let config = load(&[]).unwrap();

        // Assert
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.search_index, "datapulse-events");
        assert_eq!(config.bus_topic_alerts, "datapulse-alerts");
        assert_eq!(config.bus_capacity, 1024);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.worker_concurrency, 16);
        assert!(config.archive_dir.is_none());
        assert!(config.search_url.is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn should_read_overrides() {
        // Arrange & Act
        let config = load(&[
            ("SERVER_PORT", "9090"),
            ("ARCHIVE_DIR", "/data/archive"),
            ("SEARCH_URL", "http://search:9200"),
            ("PIPELINE_MAX_ATTEMPTS", "5"),
            ("PIPELINE_INITIAL_BACKOFF_MS", "100"),
        ])
        .unwrap();

        // Assert
        assert_eq!(config.server_port, 9090);
        assert_eq!(config.archive_dir, Some(PathBuf::from("/data/archive")));
        assert_eq!(config.search_url.as_deref(), Some("http://search:9200"));
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_interval, Duration::from_millis(100));
    }

    #[test]
    fn should_treat_blank_values_as_unset() {
        let config = load(&[("DATABASE_URL", "  "), ("SEARCH_INDEX", "")]).unwrap();

        assert!(config.database_url.is_none());
        assert_eq!(config.search_index, "datapulse-events");
    }

    #[test]
    fn should_reject_invalid_port() {
        let result = load(&[("SERVER_PORT", "http")]);

        assert!(matches!(result, Err(ConfigError::InvalidPort(_))));
    }

    #[test]
    fn should_reject_invalid_numbers() {
        assert!(matches!(
            load(&[("WORKER_CONCURRENCY", "many")]),
            Err(ConfigError::InvalidNumber { key: "WORKER_CONCURRENCY", .. })
        ));
        assert!(matches!(
            load(&[("PIPELINE_MAX_ATTEMPTS", "0")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }
}
