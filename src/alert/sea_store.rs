//! MySQL 알림 정의 저장소 (sea-orm)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

use super::entity::{alert_definition, alert_trigger};
use super::store::{AlertDefinitionStore, StoreError, StoreResult};
use super::{AlertDefinition, Severity, TriggerOutcome};

/// 알림 정의 저장소 (MySQL)
///
/// `record_trigger`는 정의 행을 배타 잠금한 트랜잭션 안에서 기존 매칭 기록을 먼저 조회합니다.
/// 유니크 인덱스 위반도 이미 적용된 것으로 처리합니다.
pub struct SeaOrmAlertStore {
    db: DatabaseConnection,
}

impl SeaOrmAlertStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load(&self, only_active: bool) -> StoreResult<Vec<AlertDefinition>> {
        let mut query = alert_definition::Entity::find();
        if only_active {
            query = query.filter(alert_definition::Column::IsActive.eq(true));
        }

        let models = query.all(&self.db).await.map_err(map_db_err)?;

        // 손상된 정의 하나 때문에 나머지 평가가 막히지 않도록 건너뜁니다
        let definitions = models
            .into_iter()
            .filter_map(|model| match to_definition(model) {
                Ok(definition) => Some(definition),
                Err(e) => {
                    warn!("Skipping alert definition: {}", e);
                    None
                }
            })
            .collect();

        Ok(definitions)
    }
}

#[async_trait]
impl AlertDefinitionStore for SeaOrmAlertStore {
    async fn list_active(&self) -> StoreResult<Vec<AlertDefinition>> {
        self.load(true).await
    }

    async fn list_all(&self) -> StoreResult<Vec<AlertDefinition>> {
        self.load(false).await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<AlertDefinition>> {
        let model = alert_definition::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(map_db_err)?;

        model.map(to_definition).transpose()
    }

    async fn upsert(&self, definition: AlertDefinition) -> StoreResult<()> {
        let condition = serde_json::to_value(&definition.condition).map_err(|e| {
            StoreError::Corrupt {
                id: definition.id,
                reason: e.to_string(),
            }
        })?;

        let model = alert_definition::ActiveModel {
            alert_definition_id: Set(definition.id),
            name: Set(definition.name),
            severity: Set(definition.severity.as_str().to_string()),
            is_active: Set(definition.is_active),
            condition: Set(condition),
            trigger_count: Set(to_db_count(definition.trigger_count)),
            last_triggered: Set(definition.last_triggered),
        };

        // 이미 저장된 trigger_count / last_triggered는 덮어쓰지 않습니다
        alert_definition::Entity::insert(model)
            .on_conflict(
                OnConflict::column(alert_definition::Column::AlertDefinitionId)
                    .update_columns([
                        alert_definition::Column::Name,
                        alert_definition::Column::Severity,
                        alert_definition::Column::IsActive,
                        alert_definition::Column::Condition,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(())
    }

    async fn record_trigger(
        &self,
        definition_id: Uuid,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<TriggerOutcome> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        // 1. 정의 행 잠금
        let model = alert_definition::Entity::find_by_id(definition_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(map_db_err)?
            .ok_or(StoreError::NotFound(definition_id))?;

        // 2. 이미 기록된 매칭인지 확인
        let existing = alert_trigger::Entity::find()
            .filter(alert_trigger::Column::AlertDefinitionId.eq(definition_id))
            .filter(alert_trigger::Column::EventId.eq(event_id))
            .one(&txn)
            .await
            .map_err(map_db_err)?;

        if existing.is_some() {
            return already_applied(txn, definition_id, event_id).await;
        }

        // 3. 매칭 기록
        let trigger = alert_trigger::ActiveModel {
            alert_definition_id: Set(definition_id),
            event_id: Set(event_id),
            triggered_at: Set(at),
            ..Default::default()
        };

        if let Err(e) = alert_trigger::Entity::insert(trigger).exec(&txn).await {
            if is_duplicate(&e) {
                return already_applied(txn, definition_id, event_id).await;
            }
            return Err(map_db_err(e));
        }

        // 4. 카운트 / 마지막 발생 시각 갱신
        let mut definition = to_definition(model)?;
        definition.apply_trigger(at);

        alert_definition::Entity::update_many()
            .col_expr(
                alert_definition::Column::TriggerCount,
                Expr::value(to_db_count(definition.trigger_count)),
            )
            .col_expr(
                alert_definition::Column::LastTriggered,
                Expr::value(definition.last_triggered),
            )
            .filter(alert_definition::Column::AlertDefinitionId.eq(definition_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;

        Ok(TriggerOutcome::Applied {
            trigger_count: definition.trigger_count,
        })
    }
}

async fn already_applied(
    txn: DatabaseTransaction,
    definition_id: Uuid,
    event_id: Uuid,
) -> StoreResult<TriggerOutcome> {
    debug!(
        definition_id = %definition_id,
        event_id = %event_id,
        "Trigger already recorded, skipping"
    );
    txn.rollback().await.map_err(map_db_err)?;
    Ok(TriggerOutcome::AlreadyApplied)
}

fn to_definition(model: alert_definition::Model) -> StoreResult<AlertDefinition> {
    let id = model.alert_definition_id;
    let corrupt = |reason: String| StoreError::Corrupt { id, reason };

    let severity = Severity::from_str(&model.severity).map_err(|e| corrupt(e.to_string()))?;
    let condition = serde_json::from_value(model.condition).map_err(|e| corrupt(e.to_string()))?;
    let trigger_count = u64::try_from(model.trigger_count)
        .map_err(|_| corrupt(format!("negative trigger_count {}", model.trigger_count)))?;

    Ok(AlertDefinition {
        id,
        name: model.name,
        severity,
        is_active: model.is_active,
        condition,
        trigger_count,
        last_triggered: model.last_triggered,
    })
}

fn to_db_count(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn is_duplicate(err: &DbErr) -> bool {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => true,
        _ => err.to_string().to_lowercase().contains("duplicate"),
    }
}

fn map_db_err(err: DbErr) -> StoreError {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertCondition, Operator};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn trigger_row(definition_id: Uuid, event_id: Uuid) -> alert_trigger::Model {
        alert_trigger::Model {
            alert_trigger_id: 1,
            alert_definition_id: definition_id,
            event_id,
            triggered_at: Utc::now(),
        }
    }

    fn model(severity: &str, condition: serde_json::Value, trigger_count: i64) -> alert_definition::Model {
        alert_definition::Model {
            alert_definition_id: Uuid::new_v4(),
            name: "p99 latency".into(),
            severity: severity.into(),
            is_active: true,
            condition,
            trigger_count,
            last_triggered: None,
        }
    }

    #[test]
    fn should_convert_row_to_definition() {
        // Arrange
        let row = model(
            "critical",
            json!({"eventType": "api_call", "field": "latency", "operator": "gte", "threshold": 500}),
            7,
        );

        // Act
        let definition = to_definition(row).expect("valid row");

        // Assert
        assert_eq!(definition.severity, Severity::Critical);
        assert_eq!(definition.trigger_count, 7);
        assert_eq!(definition.condition.field, "latency");
        assert_eq!(definition.condition.operator, Operator::Gte);
        assert_eq!(
            definition.condition,
            AlertCondition::new("gte", 500).for_event_type("api_call").on_field("latency")
        );
    }

    #[test]
    fn should_flag_unknown_severity_as_corrupt() {
        let row = model("urgent", json!({"threshold": 1}), 0);

        let result = to_definition(row);

        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn should_flag_negative_count_as_corrupt() {
        let row = model("low", json!({"threshold": 1}), -1);

        assert!(matches!(to_definition(row), Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn should_record_trigger_when_pair_is_new() {
        // Arrange
        let row = model("high", json!({"threshold": 1}), 2);
        let id = row.alert_definition_id;
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![row]])
            .append_query_results([Vec::<alert_trigger::Model>::new()])
            .append_exec_results([
                MockExecResult { last_insert_id: 1, rows_affected: 1 },
                MockExecResult { last_insert_id: 0, rows_affected: 1 },
            ])
            .into_connection();
        let store = SeaOrmAlertStore::new(db);

        // Act
        let outcome = store.record_trigger(id, Uuid::new_v4(), Utc::now()).await.unwrap();

        // Assert
        assert_eq!(outcome, TriggerOutcome::Applied { trigger_count: 3 });
    }

    #[tokio::test]
    async fn should_skip_insert_when_trigger_already_recorded() {
        // Arrange
        let row = model("high", json!({"threshold": 1}), 2);
        let id = row.alert_definition_id;
        let event_id = Uuid::new_v4();
        // exec 결과가 없으므로 INSERT/UPDATE가 실행되면 에러가 납니다
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([vec![row]])
            .append_query_results([vec![trigger_row(id, event_id)]])
            .into_connection();
        let store = SeaOrmAlertStore::new(db);

        // Act
        let outcome = store.record_trigger(id, event_id, Utc::now()).await.unwrap();

        // Assert
        assert_eq!(outcome, TriggerOutcome::AlreadyApplied);
    }

    #[tokio::test]
    async fn should_return_not_found_for_missing_definition_row() {
        let db = MockDatabase::new(DatabaseBackend::MySql)
            .append_query_results([Vec::<alert_definition::Model>::new()])
            .into_connection();
        let store = SeaOrmAlertStore::new(db);

        let result = store.record_trigger(Uuid::new_v4(), Uuid::new_v4(), Utc::now()).await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn should_map_query_errors_to_database_error() {
        let err = map_db_err(DbErr::Custom("bad query".into()));

        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_transient());
    }
}
