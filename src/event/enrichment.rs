//! 이벤트 보강: 부가 속성을 계산합니다.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{coerce_number, Event};

/// 구간 분류에 사용하는 페이로드 필드
pub const VALUE_FIELD: &str = "value";
/// 구간 이름을 기록하는 페이로드 필드
pub const VALUE_CATEGORY_FIELD: &str = "value_category";

/// `value` 필드의 값 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueCategory {
    /// `value <= 50`
    Low,
    /// `50 < value <= 100`
    Medium,
    /// `value > 100`
    High,
}

impl ValueCategory {
    /// 값의 구간을 반환합니다 (NaN은 `None`).
    pub fn classify(value: f64) -> Option<Self> {
        if value.is_nan() {
            None
        } else if value > 100.0 {
            Some(ValueCategory::High)
        } else if value > 50.0 {
            Some(ValueCategory::Medium)
        } else {
            Some(ValueCategory::Low)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueCategory::Low => "low",
            ValueCategory::Medium => "medium",
            ValueCategory::High => "high",
        }
    }
}

/// `event`를 보강한 복사본을 반환합니다.
///
/// 입력은 수정하지 않습니다. 이미 보강된 이벤트는 `processed_at`을 유지하므로
/// `enrich(&enrich(e)) == enrich(e)`입니다.
pub fn enrich(event: &Event) -> Event {
    let mut enriched = event.clone();
    enriched.processed_at = Some(event.processed_at.unwrap_or_else(Utc::now));
    enriched.enriched = true;

    let category = event
        .payload
        .get(VALUE_FIELD)
        .and_then(coerce_number)
        .and_then(ValueCategory::classify);

    if let Some(category) = category {
        enriched.payload.insert(
            VALUE_CATEGORY_FIELD.to_string(),
            Value::String(category.as_str().to_string()),
        );
    }

    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::payload_from;
    use serde_json::json;

    fn event_with_value(value: Value) -> Event {
        Event::new("api_call", payload_from(json!({ "value": value })))
    }

    fn category_of(event: &Event) -> Option<&str> {
        event.payload.get(VALUE_CATEGORY_FIELD).and_then(|v| v.as_str())
    }

    #[test]
    fn should_classify_boundaries_exactly() {
        assert_eq!(ValueCategory::classify(100.0), Some(ValueCategory::Medium));
        assert_eq!(ValueCategory::classify(100.0001), Some(ValueCategory::High));
        assert_eq!(ValueCategory::classify(50.0), Some(ValueCategory::Low));
        assert_eq!(ValueCategory::classify(50.0001), Some(ValueCategory::Medium));
        assert_eq!(ValueCategory::classify(-10.0), Some(ValueCategory::Low));
        assert_eq!(ValueCategory::classify(f64::NAN), None);
    }

    #[test]
    fn should_add_high_category_for_large_value() {
        // Arrange
        let event = event_with_value(json!(120));

        // Act
        let enriched = enrich(&event);

        // Assert
        assert_eq!(category_of(&enriched), Some("high"));
        assert!(enriched.enriched);
        assert!(enriched.processed_at.is_some());
    }

    #[test]
    fn should_classify_numeric_string_value() {
        let enriched = enrich(&event_with_value(json!("75")));

        assert_eq!(category_of(&enriched), Some("medium"));
    }

    #[test]
    fn should_leave_non_numeric_value_unclassified() {
        // Arrange
        let event = event_with_value(json!("not-a-number"));

        // Act
        let enriched = enrich(&event);

        // Assert
        assert!(category_of(&enriched).is_none());
        assert!(enriched.enriched);
    }

    #[test]
    fn should_leave_missing_value_unclassified() {
        let event = Event::new("page_view", payload_from(json!({"path": "/home"})));

        let enriched = enrich(&event);

        assert!(!enriched.payload.contains_key(VALUE_CATEGORY_FIELD));
    }

    #[test]
    fn should_not_mutate_input() {
        // Arrange
        let event = event_with_value(json!(10));
        let snapshot = event.clone();

        // Act
        let _ = enrich(&event);

        // Assert
        assert_eq!(event, snapshot);
    }

    #[test]
    fn should_be_idempotent_when_applied_twice() {
        // Arrange
        let event = event_with_value(json!(100));

        // Act
        let once = enrich(&event);
        let twice = enrich(&once);

        // Assert
        assert_eq!(once, twice);
        assert_eq!(category_of(&twice), Some("medium"));
    }
}
