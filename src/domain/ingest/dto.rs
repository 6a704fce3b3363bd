use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::event::RawEvent;
use crate::pipeline::{EventOutcome, ProcessedEvent};
use crate::sink::SinkKind;

// ============== 단건 수집 ==============

/// 처리 결과 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    /// 모든 싱크 전달 성공
    Processed,
    /// 처리 완료, 일부 싱크 전달 실패
    Partial,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub event_id: Uuid,
    pub status: IngestStatus,
    pub delivered_sinks: Vec<SinkKind>,
    pub failed_sinks: Vec<SinkKind>,
    /// 이번 이벤트로 발생한 알림 수
    #[schema(example = 1)]
    pub alerts_triggered: usize,
    #[schema(example = 1)]
    pub attempts: u32,
}

impl From<&ProcessedEvent> for IngestResult {
    fn from(processed: &ProcessedEvent) -> Self {
        Self {
            event_id: processed.event.id,
            status: if processed.is_partial() {
                IngestStatus::Partial
            } else {
                IngestStatus::Processed
            },
            delivered_sinks: processed.fanout.delivered(),
            failed_sinks: processed.fanout.failed(),
            alerts_triggered: processed.alerts.len(),
            attempts: processed.attempts,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessIngestResponse {
    pub is_success: bool,
    pub code: String,
    pub message: String,
    pub result: IngestResult,
}

// ============== 대량 수집 ==============

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestRequest {
    #[validate(length(min = 1, max = 1000, message = "events는 1개 이상 1000개 이하여야 합니다."))]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemResult {
    /// 요청 배열 내 위치
    pub index: usize,
    /// processed / failed / rejected / cancelled
    #[schema(value_type = String, example = "processed")]
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn from_outcome(index: usize, outcome: &EventOutcome) -> Self {
        let (event_id, error) = match outcome {
            EventOutcome::Processed(processed) => (Some(processed.event.id), None),
            EventOutcome::Failed {
                event_id, error, ..
            } => (Some(*event_id), Some(error.clone())),
            EventOutcome::Rejected { reason } => (None, Some(reason.clone())),
            EventOutcome::Cancelled => (None, None),
        };

        Self {
            index,
            status: outcome.as_str(),
            event_id,
            error,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkIngestResult {
    pub total: usize,
    pub processed: usize,
    pub failed: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkIngestResult {
    pub fn from_outcomes(outcomes: &[EventOutcome]) -> Self {
        let count = |status: &str| outcomes.iter().filter(|o| o.as_str() == status).count();

        Self {
            total: outcomes.len(),
            processed: count("processed"),
            failed: count("failed"),
            rejected: count("rejected"),
            cancelled: count("cancelled"),
            results: outcomes
                .iter()
                .enumerate()
                .map(|(index, outcome)| BulkItemResult::from_outcome(index, outcome))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBulkIngestResponse {
    pub is_success: bool,
    pub code: String,
    pub message: String,
    pub result: BulkIngestResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_reject_empty_bulk_request() {
        let request = BulkIngestRequest { events: vec![] };

        assert!(request.validate().is_err());
    }

    #[test]
    fn should_reject_oversized_bulk_request() {
        let request = BulkIngestRequest {
            events: vec![RawEvent::new("x", json!({})); 1001],
        };

        assert!(request.validate().is_err());
    }

    #[test]
    fn should_count_outcomes_by_status() {
        // Arrange
        let outcomes = vec![
            EventOutcome::Rejected {
                reason: "blank".into(),
            },
            EventOutcome::Cancelled,
            EventOutcome::Failed {
                event_id: Uuid::nil(),
                error: "store down".into(),
                attempts: 3,
            },
        ];

        // Act
        let result = BulkIngestResult::from_outcomes(&outcomes);
        let json = serde_json::to_value(&result).unwrap();

        // Assert
        assert_eq!(result.total, 3);
        assert_eq!(result.rejected, 1);
        assert_eq!(result.cancelled, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(json["results"][0]["status"], "rejected");
        assert!(json["results"][1].get("eventId").is_none());
        assert_eq!(json["results"][2]["eventId"], json!(Uuid::nil()));
    }
}
