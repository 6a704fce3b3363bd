//! Intake: 수집 요청을 검증해 [`Event`]로 정규화합니다.

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::{Event, Payload, RawEvent};
use crate::pipeline::PipelineError;

/// 웹훅 요청의 이벤트 타입
pub const WEBHOOK_EVENT_TYPE: &str = "webhook";

/// 수집 요청을 검증해 미처리 [`Event`]로 변환합니다.
///
/// 새 ID를 발급하고, 발생 시각이 없으면 현재 UTC 시각을 넣습니다. 싱크에는 접근하지 않습니다.
pub fn accept(raw: RawEvent) -> Result<Event, PipelineError> {
    raw.validate()
        .map_err(|e| PipelineError::Validation(e.to_string()))?;

    if raw.event_type.trim().is_empty() {
        return Err(PipelineError::Validation(
            "eventType must not be blank".to_string(),
        ));
    }

    let payload = into_object("payload", raw.payload)?;
    let metadata = into_object("metadata", raw.metadata)?;

    Ok(Event {
        id: Uuid::new_v4(),
        event_type: raw.event_type,
        source_id: raw.source_id.filter(|s| !s.trim().is_empty()),
        payload,
        metadata,
        timestamp: raw.timestamp.unwrap_or_else(Utc::now),
        processed: false,
        processed_at: None,
        enriched: false,
    })
}

/// `source_id` 웹훅 호출을 수집 요청으로 변환합니다.
pub fn webhook_submission(source_id: &str, payload: Value) -> RawEvent {
    RawEvent::new(WEBHOOK_EVENT_TYPE, payload)
        .with_source_id(source_id)
        .with_metadata(json!({ "ingestion_method": "webhook" }))
}

fn into_object(field: &str, value: Option<Value>) -> Result<Payload, PipelineError> {
    match value {
        None | Some(Value::Null) => Ok(Payload::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(PipelineError::Validation(format!(
            "{} must be a JSON object, got {}",
            field,
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
