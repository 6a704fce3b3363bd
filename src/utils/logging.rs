//! 로깅 초기화 모듈
//!
//! stdout과 일별 로그 파일에 동시 출력합니다. 파일은 항상 JSON이며,
//! stdout은 `LOG_FORMAT=pretty`로 사람이 읽기 쉬운 형식으로 바꿀 수 있습니다.

use std::path::PathBuf;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG`가 없을 때 사용하는 기본 필터
pub const DEFAULT_LOG_FILTER: &str = "info,datapulse_server=debug";

const LOG_FILE_PREFIX: &str = "datapulse.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// 로깅 설정 (`LOG_DIR`, `LOG_FORMAT`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub dir: PathBuf,
    pub stdout_format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            stdout_format: LogFormat::Json,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 알 수 없는 `LOG_FORMAT` 값은 JSON으로 취급합니다.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let stdout_format = match get("LOG_FORMAT").as_deref().map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };

        Self {
            dir: get("LOG_DIR").map(PathBuf::from).unwrap_or(defaults.dir),
            stdout_format,
        }
    }
}

/// 로깅 시스템을 초기화합니다.
///
/// 필터는 `RUST_LOG`, 없으면 [`DEFAULT_LOG_FILTER`]를 사용합니다.
/// 파일명 형식: `datapulse.log.YYYY-MM-DD`
///
/// 반환되는 `WorkerGuard`를 main에서 유지해야 종료 시 버퍼링된 로그가 기록됩니다.
/// 이미 전역 subscriber가 설치된 경우(테스트 등)에는 조용히 넘어갑니다.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    let file_appender = rolling::daily(&settings.dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_stdout = (settings.stdout_format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_current_span(true)
    });
    let pretty_stdout = (settings.stdout_format == LogFormat::Pretty)
        .then(|| fmt::layer().pretty().with_timer(fmt::time::UtcTime::rfc_3339()));

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(json_stdout)
        .with(pretty_stdout)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Tracing was not initialized: {}", err);
    }

    guard
}
