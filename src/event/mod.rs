//! 이벤트 모델과 Intake 검증, Enrichment

pub mod enrichment;
pub mod intake;

mod event_types;

pub use enrichment::{enrich, ValueCategory, VALUE_CATEGORY_FIELD, VALUE_FIELD};
pub use event_types::{payload_from, Event, Payload, RawEvent};

use serde_json::Value;

/// 페이로드 값을 `f64`로 변환합니다.
///
/// JSON 숫자와 실수 문자열만 변환되며 그 외 타입은 `None`입니다.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
