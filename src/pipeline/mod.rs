//! 이벤트 처리: Enrichment, Fan-out, 알림 평가, 재시도

pub mod dead_letter;
pub mod dispatcher;
pub mod processor;
pub mod retry;

use crate::alert::StoreError;
use crate::sink::SinkKind;

pub use dead_letter::{DeadLetterQueue, FailedEvent, FileDeadLetter, InMemoryDeadLetter};
pub use dispatcher::{FanOutDispatcher, FanOutReport, SinkOutcome};
pub use processor::{EventOutcome, EventPipeline, ProcessedEvent};
pub use retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    /// 잘못된 입력 (재시도 안 함)
    #[error("validation failed: {0}")]
    Validation(String),
    /// Fan-out 싱크에 연결할 수 없음
    #[error("sink {sink} unavailable: {reason}")]
    SinkUnavailable { sink: SinkKind, reason: String },
    /// 재시도 가능한 처리 실패
    #[error("transient processing error: {0}")]
    Transient(String),
    /// 재시도 불가 또는 재시도 소진
    #[error("permanent processing error: {0}")]
    Permanent(String),
    /// 싱크 쓰기 전에 취소됨
    #[error("processing cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Transient(_) | PipelineError::SinkUnavailable { .. }
        )
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            PipelineError::Transient(err.to_string())
        } else {
            PipelineError::Permanent(err.to_string())
        }
    }
}
