use backoff::{future::retry, ExponentialBackoff};
use std::future::Future;
use std::time::Duration;

use super::PipelineError;

/// 재시도 정책
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 첫 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 재시도 없는 정책
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// 지수 백오프 설정 생성
    ///
    /// 경과 시간 제한은 두지 않고 시도 횟수로만 종료합니다.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            multiplier: self.multiplier,
            ..Default::default()
        }
    }
}

/// 재시도 로직을 적용한 비동기 작업 실행
///
/// `operation`은 1부터 시작하는 시도 번호를 받습니다. 재시도 가능한 에러는
/// 지수 백오프로 다시 실행하고, 영구적 에러나 시도 횟수 소진 시 마지막 에러를
/// 그대로 반환합니다.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, PipelineError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    retry(policy.backoff(), || {
        attempt += 1;
        let current = attempt;
        let fut = operation(current);

        async move {
            match fut.await {
                Ok(result) => Ok(result),
                Err(e) if e.is_retryable() && current < max_attempts => {
                    tracing::warn!(error = %e, attempt = current, "Retryable error, will retry...");
                    metrics::counter!("pipeline_retries_total").increment(1);
                    Err(backoff::Error::transient(e))
                }
                Err(e) if e.is_retryable() => {
                    tracing::error!(error = %e, attempts = current, "Retries exhausted");
                    Err(backoff::Error::permanent(e))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Permanent error, not retrying");
                    Err(backoff::Error::permanent(e))
                }
            }
        }
    })
    .await
}
