//! 알림 정의, 조건, 매칭 타입

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::event::{Event, VALUE_FIELD};

/// 알림 심각도 (`low < medium < high < critical`)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err("invalid severity value: expected 'low', 'medium', 'high', or 'critical'"),
        }
    }
}

/// 알림 조건의 비교 연산자
///
/// 알 수 없는 연산자 문자열은 [`Operator::Unknown`]으로 읽히며, 이 조건은 절대 매칭되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    #[default]
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Unknown(String),
}

impl Operator {
    /// `value <op> threshold` 비교 (알 수 없는 연산자면 `None`)
    pub fn apply(&self, value: f64, threshold: f64) -> Option<bool> {
        match self {
            Operator::Gt => Some(value > threshold),
            Operator::Gte => Some(value >= threshold),
            Operator::Lt => Some(value < threshold),
            Operator::Lte => Some(value <= threshold),
            Operator::Eq => Some(value == threshold),
            Operator::Unknown(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Eq => "eq",
            Operator::Unknown(raw) => raw,
        }
    }
}

impl From<String> for Operator {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "eq" => Operator::Eq,
            _ => Operator::Unknown(raw),
        }
    }
}

impl From<&str> for Operator {
    fn from(raw: &str) -> Self {
        Operator::from(raw.to_string())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

fn default_field() -> String {
    VALUE_FIELD.to_string()
}

/// 페이로드 숫자 필드 하나에 대한 임계값 조건
///
/// 알 수 없는 키는 거부합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlertCondition {
    /// 일치해야 하는 이벤트 타입 (`None`이면 모든 타입)
    #[serde(
        default,
        alias = "eventType",
        alias = "event_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub event_type_filter: Option<String>,
    /// 검사할 페이로드 필드
    #[serde(default = "default_field")]
    pub field: String,
    #[serde(default)]
    #[schema(value_type = String, example = "gt")]
    pub operator: Operator,
    /// 임계값 (평가 시점에 숫자로 변환)
    #[serde(default)]
    #[schema(value_type = f64, example = 100)]
    pub threshold: Value,
}

impl AlertCondition {
    pub fn new(operator: impl Into<Operator>, threshold: impl Into<Value>) -> Self {
        Self {
            event_type_filter: None,
            field: default_field(),
            operator: operator.into(),
            threshold: threshold.into(),
        }
    }

    pub fn for_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type_filter = Some(event_type.into());
        self
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

/// 이벤트를 감시하는 사용자 알림 규칙
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertDefinition {
    pub id: Uuid,
    pub name: String,
    pub severity: Severity,
    pub is_active: bool,
    pub condition: AlertCondition,
    /// 적용된 매칭마다 정확히 1씩 증가
    #[serde(default)]
    pub trigger_count: u64,
    /// 마지막 매칭 시각 (뒤로 가지 않음)
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
}

impl AlertDefinition {
    /// 트리거 이력이 없는 활성 정의를 생성합니다.
    pub fn new(name: impl Into<String>, severity: Severity, condition: AlertCondition) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            severity,
            is_active: true,
            condition,
            trigger_count: 0,
            last_triggered: None,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// 트리거 1건을 카운트와 마지막 발생 시각에 반영합니다.
    pub fn apply_trigger(&mut self, at: DateTime<Utc>) {
        self.trigger_count += 1;
        self.last_triggered = Some(match self.last_triggered {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }
}

/// 정의 하나가 이벤트 하나에 매칭된 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AlertMatch {
    pub definition_id: Uuid,
    pub definition_name: String,
    pub event_id: Uuid,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl AlertMatch {
    pub fn new(definition: &AlertDefinition, event: &Event, timestamp: DateTime<Utc>) -> Self {
        Self {
            definition_id: definition.id,
            definition_name: definition.name.clone(),
            event_id: event.id,
            severity: definition.severity,
            timestamp,
        }
    }
}

/// 저장소에 트리거를 기록한 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// 반영됨 (갱신된 카운트)
    Applied { trigger_count: u64 },
    /// 이미 기록된 (정의, 이벤트) 쌍
    AlreadyApplied,
}
