//! 조건 매칭: [`Event`]가 [`AlertCondition`]을 만족하는지 판단합니다.
//!
//! 매칭 실패는 에러가 아닙니다. 필드가 없거나 숫자가 아니면 단순히 매칭되지 않은 것입니다.

use super::AlertCondition;
use crate::event::{coerce_number, Event};

/// 조건이 매칭되지 않은 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// `event_type_filter`가 이벤트 타입과 다름
    EventType,
    /// 검사할 필드가 없음
    MissingField,
    /// 필드 값이 숫자로 변환되지 않음
    NonNumericValue,
    /// 임계값이 숫자로 변환되지 않음
    NonNumericThreshold,
    /// 지원하지 않는 연산자
    UnknownOperator,
    /// 비교 결과가 거짓
    Comparison,
}

impl Mismatch {
    /// 일반적인 불일치가 아니라 정의 설정 오류로 보이는 경우
    pub fn is_configuration_hint(&self) -> bool {
        matches!(
            self,
            Mismatch::NonNumericValue | Mismatch::NonNumericThreshold | Mismatch::UnknownOperator
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mismatch::EventType => "event_type",
            Mismatch::MissingField => "missing_field",
            Mismatch::NonNumericValue => "non_numeric_value",
            Mismatch::NonNumericThreshold => "non_numeric_threshold",
            Mismatch::UnknownOperator => "unknown_operator",
            Mismatch::Comparison => "comparison",
        }
    }
}

/// 조건을 평가하고, 매칭되지 않으면 첫 번째 이유를 반환합니다.
pub fn check(condition: &AlertCondition, event: &Event) -> Result<(), Mismatch> {
    if let Some(ref filter) = condition.event_type_filter {
        if *filter != event.event_type {
            return Err(Mismatch::EventType);
        }
    }

    let raw_value = event
        .field(&condition.field)
        .filter(|v| !v.is_null())
        .ok_or(Mismatch::MissingField)?;

    let value = coerce_number(raw_value).ok_or(Mismatch::NonNumericValue)?;
    let threshold = coerce_number(&condition.threshold).ok_or(Mismatch::NonNumericThreshold)?;

    match condition.operator.apply(value, threshold) {
        Some(true) => Ok(()),
        Some(false) => Err(Mismatch::Comparison),
        None => Err(Mismatch::UnknownOperator),
    }
}
