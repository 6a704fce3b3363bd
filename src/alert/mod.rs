//! 알림 정의와 조건 매칭, 트리거 기록

pub mod condition;
pub mod entity;
pub mod evaluator;
pub mod sea_store;
pub mod store;

mod alert_types;

pub use alert_types::{
    AlertCondition, AlertDefinition, AlertMatch, Operator, Severity, TriggerOutcome,
};
pub use evaluator::{AlertEvaluator, EvaluationFailure};
pub use sea_store::SeaOrmAlertStore;
pub use store::{AlertDefinitionStore, InMemoryAlertStore, StoreError, StoreResult};
