//! 알림 평가: 활성 정의를 보강된 이벤트와 매칭합니다.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::condition::{self, Mismatch};
use super::{AlertDefinitionStore, AlertMatch, StoreError, TriggerOutcome};
use crate::event::Event;
use crate::pipeline::PipelineError;
use crate::sink::NotificationSink;

/// 이벤트 하나에 대해 모든 활성 알림 정의를 평가합니다.
///
/// 저장소가 (정의, 이벤트) 단위로 중복을 걸러내므로 같은 이벤트를 다시 평가해도
/// 카운트와 알림이 중복되지 않습니다.
#[derive(Clone)]
pub struct AlertEvaluator {
    store: Arc<dyn AlertDefinitionStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl AlertEvaluator {
    pub fn new(store: Arc<dyn AlertDefinitionStore>, notifier: Arc<dyn NotificationSink>) -> Self {
        Self { store, notifier }
    }

    pub fn store(&self) -> &Arc<dyn AlertDefinitionStore> {
        &self.store
    }

    /// 이벤트를 평가하고 이번 호출에서 새로 적용된 매칭을 반환합니다.
    ///
    /// 저장소 에러로 중단되면 그 전까지 적용된 매칭을 [`EvaluationFailure`]에 담아 돌려줍니다.
    /// 이미 기록된 매칭은 재시도 때 `AlreadyApplied`로 건너뛰므로 호출자가 보관해야 합니다.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn evaluate(&self, event: &Event) -> Result<Vec<AlertMatch>, EvaluationFailure> {
        let definitions = match self.store.list_active().await {
            Ok(definitions) => definitions,
            Err(e) => return Err(EvaluationFailure::new(Vec::new(), e.into())),
        };
        let at = event.processed_at.unwrap_or_else(Utc::now);

        let mut matches = Vec::new();

        for definition in definitions.iter().filter(|d| d.is_active) {
            if let Err(mismatch) = condition::check(&definition.condition, event) {
                log_mismatch(definition.id, mismatch);
                continue;
            }

            let outcome = match self.store.record_trigger(definition.id, event.id, at).await {
                Ok(outcome) => outcome,
                Err(StoreError::NotFound(id)) => {
                    // 평가 도중 삭제된 정의
                    warn!(definition_id = %id, "Alert definition disappeared during evaluation");
                    continue;
                }
                Err(e) => return Err(EvaluationFailure::new(matches, e.into())),
            };

            let trigger_count = match outcome {
                TriggerOutcome::Applied { trigger_count } => trigger_count,
                TriggerOutcome::AlreadyApplied => continue,
            };

            let alert = AlertMatch::new(definition, event, at);

            info!(
                definition_id = %definition.id,
                severity = %definition.severity,
                trigger_count,
                "Alert triggered: {}",
                definition.name
            );
            metrics::counter!("alerts_triggered_total", "severity" => definition.severity.as_str())
                .increment(1);

            if let Err(e) = self.notifier.notify(&alert).await {
                error!(
                    definition_id = %definition.id,
                    "Failed to deliver alert notification: {}",
                    e
                );
                metrics::counter!("notification_failures_total").increment(1);
            }

            matches.push(alert);
        }

        Ok(matches)
    }
}

/// 평가 중단 시 에러와 그 전까지 적용된 매칭
#[derive(Debug)]
pub struct EvaluationFailure {
    pub applied: Vec<AlertMatch>,
    pub error: PipelineError,
}

impl EvaluationFailure {
    fn new(applied: Vec<AlertMatch>, error: PipelineError) -> Self {
        Self { applied, error }
    }
}

fn log_mismatch(definition_id: uuid::Uuid, mismatch: Mismatch) {
    if mismatch.is_configuration_hint() {
        debug!(
            definition_id = %definition_id,
            reason = mismatch.as_str(),
            "Alert condition skipped; check the definition's field and threshold"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertCondition, AlertDefinition, InMemoryAlertStore, Severity};
    use crate::event::{enrich, payload_from};
    use crate::sink::SinkError;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<AlertMatch>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingNotifier {
        async fn notify(&self, alert: &AlertMatch) -> Result<(), SinkError> {
            self.sent.lock().await.push(alert.clone());
            if self.fail {
                return Err(SinkError::Unreachable("webhook down".into()));
            }
            Ok(())
        }
    }

    async fn setup(
        definitions: Vec<AlertDefinition>,
        fail: bool,
    ) -> (AlertEvaluator, Arc<InMemoryAlertStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(InMemoryAlertStore::with_definitions(definitions).await);
        let notifier = Arc::new(RecordingNotifier {
            fail,
            ..Default::default()
        });
        let evaluator = AlertEvaluator::new(store.clone(), notifier.clone());
        (evaluator, store, notifier)
    }

    fn event(event_type: &str, value: serde_json::Value) -> Event {
        enrich(&Event::new(event_type, payload_from(json!({ "value": value }))))
    }

    #[tokio::test]
    async fn should_emit_one_match_and_increment_count() {
        // Arrange
        let def = AlertDefinition::new("over 100", Severity::High, AlertCondition::new("gt", 100));
        let (evaluator, store, notifier) = setup(vec![def.clone()], false).await;

        // Act
        let matches = evaluator.evaluate(&event("api_call", json!(150))).await.unwrap();

        // Assert
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].definition_id, def.id);
        assert_eq!(notifier.sent.lock().await.len(), 1);
        assert_eq!(store.get(def.id).await.unwrap().unwrap().trigger_count, 1);
    }

    #[tokio::test]
    async fn should_not_match_boundary_for_gt_but_match_gte() {
        // Arrange
        let gt = AlertDefinition::new("gt", Severity::Low, AlertCondition::new("gt", 100));
        let gte = AlertDefinition::new("gte", Severity::Low, AlertCondition::new("gte", 100));
        let (evaluator, store, _) = setup(vec![gt.clone(), gte.clone()], false).await;

        // Act
        let matches = evaluator.evaluate(&event("api_call", json!(100))).await.unwrap();

        // Assert
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].definition_id, gte.id);
        assert_eq!(store.get(gt.id).await.unwrap().unwrap().trigger_count, 0);
    }

    #[tokio::test]
    async fn should_skip_inactive_definitions() {
        let def = AlertDefinition::new("off", Severity::Low, AlertCondition::new("gt", 0)).inactive();
        let (evaluator, store, notifier) = setup(vec![def.clone()], false).await;

        let matches = evaluator.evaluate(&event("x", json!(10))).await.unwrap();

        assert!(matches.is_empty());
        assert!(notifier.sent.lock().await.is_empty());
        assert_eq!(store.get(def.id).await.unwrap().unwrap().trigger_count, 0);
    }

    #[tokio::test]
    async fn should_not_match_other_event_type() {
        let condition = AlertCondition::new("gt", 0).for_event_type("purchase");
        let def = AlertDefinition::new("purchases", Severity::Medium, condition);
        let (evaluator, _, _) = setup(vec![def], false).await;

        let matches = evaluator.evaluate(&event("page_view", json!(1_000))).await.unwrap();

        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn should_yield_no_match_for_non_numeric_value() {
        let def = AlertDefinition::new("d", Severity::Low, AlertCondition::new("gt", 1));
        let (evaluator, _, _) = setup(vec![def], false).await;

        let result = evaluator.evaluate(&event("x", json!("not a number"))).await;

        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_not_double_count_on_reevaluation() {
        // Arrange
        let def = AlertDefinition::new("d", Severity::Critical, AlertCondition::new("gt", 1));
        let (evaluator, store, notifier) = setup(vec![def.clone()], false).await;
        let event = event("x", json!(5));

        // Act
        let first = evaluator.evaluate(&event).await.unwrap();
        let second = evaluator.evaluate(&event).await.unwrap();

        // Assert
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(notifier.sent.lock().await.len(), 1);
        assert_eq!(store.get(def.id).await.unwrap().unwrap().trigger_count, 1);
    }

    #[tokio::test]
    async fn should_keep_match_when_notification_fails() {
        let def = AlertDefinition::new("d", Severity::High, AlertCondition::new("gt", 1));
        let (evaluator, store, _) = setup(vec![def.clone()], true).await;

        let matches = evaluator.evaluate(&event("x", json!(5))).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(store.get(def.id).await.unwrap().unwrap().trigger_count, 1);
    }

    #[tokio::test]
    async fn should_stamp_last_triggered_with_processing_time() {
        let def = AlertDefinition::new("d", Severity::High, AlertCondition::new("gt", 1));
        let (evaluator, store, _) = setup(vec![def.clone()], false).await;
        let event = event("x", json!(5));

        evaluator.evaluate(&event).await.unwrap();

        let stored = store.get(def.id).await.unwrap().unwrap();
        assert_eq!(stored.last_triggered, event.processed_at);
    }
}
