use std::time::{Duration, Instant};

use tokio::time::timeout;

use super::dto::{CheckResult, HealthChecks, HealthState, HealthStatus};
use crate::state::AppState;

/// 서버 시작 시간 (전역)
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// 헬스체크 타임아웃 (5초)
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Degraded 상태 임계값 (2초)
const DEGRADED_THRESHOLD: Duration = Duration::from_secs(2);

/// 서버 시작 시간 초기화
///
/// main 함수에서 서버 시작 시 호출해야 합니다.
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

pub fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

pub async fn check_health(state: &AppState) -> HealthStatus {
    let store_check = check_alert_store(state).await;
    let dead_letters = match state.dead_letters().len().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to count dead-letter entries");
            None
        }
    };
    let shutting_down = *state.shutdown.borrow();

    let status = if shutting_down {
        HealthState::Unhealthy
    } else {
        determine_health_state(&store_check)
    };

    HealthStatus {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: get_uptime_secs(),
        shutting_down,
        checks: HealthChecks {
            alert_store: store_check,
            dead_letters,
        },
    }
}

fn determine_health_state(check: &CheckResult) -> HealthState {
    if !check.status {
        return HealthState::Unhealthy;
    }

    // 응답 시간이 2초 이상이면 Degraded
    if let Some(latency) = check.latency_ms {
        if latency >= DEGRADED_THRESHOLD.as_millis() as u64 {
            return HealthState::Degraded;
        }
    }

    HealthState::Healthy
}

async fn check_alert_store(state: &AppState) -> CheckResult {
    let start = Instant::now();
    let result = timeout(HEALTH_CHECK_TIMEOUT, state.alert_store.list_active()).await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(definitions)) => {
            tracing::debug!(latency_ms, active = definitions.len(), "Alert store check passed");
            CheckResult::success(latency_ms)
        }
        Ok(Err(e)) => {
            tracing::warn!(latency_ms, error = %e, "Alert store check failed");
            CheckResult::failure(latency_ms, e.to_string())
        }
        Err(_) => {
            tracing::warn!("Alert store check timed out");
            CheckResult::timeout(latency_ms)
        }
    }
}
