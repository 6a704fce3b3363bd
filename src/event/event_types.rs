//! 이벤트 구조와 수집 요청 타입

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// payload와 metadata에 쓰는 필드 맵
pub type Payload = Map<String, Value>;

/// Intake 검증 전의 수집 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Event type (e.g., "page_view", "purchase", "api_call")
    #[serde(default, alias = "event_type")]
    #[validate(length(min = 1, max = 100, message = "eventType은 1자 이상 100자 이하여야 합니다"))]
    pub event_type: String,
    /// 데이터 소스 (수동 제출이면 없음)
    #[serde(default, alias = "source_id")]
    pub source_id: Option<String>,
    /// 호출자 정의 필드 (JSON 객체)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Option<Value>,
    /// 출처 정보 (client IP, user agent, region 등, JSON 객체)
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Option<Value>,
    /// 발생 시각 (없으면 수집 시각)
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Some(payload),
            ..Default::default()
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// 수집된 분석 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Intake에서 발급하는 이벤트 ID
    pub id: Uuid,
    pub event_type: String,
    pub source_id: Option<String>,
    #[schema(value_type = Object)]
    pub payload: Payload,
    #[schema(value_type = Object)]
    pub metadata: Payload,
    /// 발생 시각 (UTC)
    pub timestamp: DateTime<Utc>,
    /// Fan-out과 알림 평가가 모두 끝난 뒤에만 true
    pub processed: bool,
    /// Enrichment 시각
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// Enrichment 여부
    #[serde(default)]
    pub enriched: bool,
}

impl Event {
    /// 현재 시각으로 미처리 이벤트를 생성합니다.
    pub fn new(event_type: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            source_id: None,
            payload,
            metadata: Payload::new(),
            timestamp: Utc::now(),
            processed: false,
            processed_at: None,
            enriched: false,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Payload) -> Self {
        self.metadata = metadata;
        self
    }

    /// 페이로드 필드 조회
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// 파일 저장용 파일명
    pub fn to_filename(&self) -> String {
        format!("{}.json", self.id)
    }
}

/// `json!({...})` 값을 페이로드 맵으로 변환합니다 (객체가 아니면 빈 맵).
pub fn payload_from(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_create_unprocessed_event() {
        // Arrange & Act
        let event = Event::new("page_view", payload_from(json!({"value": 3})));

        // Assert
        assert_eq!(event.event_type, "page_view");
        assert!(!event.processed);
        assert!(!event.enriched);
        assert!(event.processed_at.is_none());
        assert_eq!(event.field("value"), Some(&json!(3)));
    }

    #[test]
    fn should_accept_snake_case_aliases_in_raw_event() {
        // Arrange
        let json = r#"{
            "event_type": "purchase",
            "source_id": "src-1",
            "payload": {"value": 10}
        }"#;

        // Act
        let raw: RawEvent = serde_json::from_str(json).expect("Failed to deserialize");

        // Assert
        assert_eq!(raw.event_type, "purchase");
        assert_eq!(raw.source_id.as_deref(), Some("src-1"));
        assert!(raw.timestamp.is_none());
    }

    #[test]
    fn should_serialize_event_to_camel_case_json() {
        // Arrange
        let event = Event::new("test.event", payload_from(json!({"nested": {"a": [1, 2]}})))
            .with_source_id("src");

        // Act
        let json = serde_json::to_string(&event).expect("Failed to serialize");

        // Assert
        assert!(json.contains("eventType"));
        assert!(json.contains("sourceId"));
        assert!(!json.contains("event_type"));
        assert!(!json.contains("processedAt"));
    }

    #[test]
    fn should_round_trip_nested_payload() {
        let event = Event::new(
            "test.event",
            payload_from(json!({"value": 1.5, "tags": ["a", "b"], "ctx": {"region": "eu"}})),
        );

        let json = serde_json::to_string(&event).expect("Failed to serialize");
        let decoded: Event = serde_json::from_str(&json).expect("Failed to deserialize");

        assert_eq!(decoded, event);
    }

    #[test]
    fn should_ignore_non_object_in_payload_from() {
        assert!(payload_from(json!([1, 2, 3])).is_empty());
        assert!(payload_from(json!("text")).is_empty());
    }
}
