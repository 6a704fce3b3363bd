//! 알림 정의 저장소 추상화와 인메모리 구현

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{AlertDefinition, TriggerOutcome};

/// 저장소 작업 결과 타입
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("alert definition {0} not found")]
    NotFound(Uuid),
    #[error("alert store unavailable: {0}")]
    Unavailable(String),
    #[error("alert store error: {0}")]
    Database(String),
    #[error("corrupt alert definition {id}: {reason}")]
    Corrupt { id: Uuid, reason: String },
}

impl StoreError {
    /// 연결 수준 장애만 재시도 대상입니다.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// 알림 정의와 트리거 기록 저장소
///
/// `record_trigger`는 정의별로 직렬화되어야 하며 `(definition_id, event_id)` 단위로 중복을 거릅니다.
/// 같은 쌍을 두 번 기록하면 카운트는 그대로이고 [`TriggerOutcome::AlreadyApplied`]를 반환합니다.
#[async_trait]
pub trait AlertDefinitionStore: Send + Sync {
    /// `is_active = true`인 정의 목록
    async fn list_active(&self) -> StoreResult<Vec<AlertDefinition>>;

    /// 비활성 포함 전체 정의 목록
    async fn list_all(&self) -> StoreResult<Vec<AlertDefinition>>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<AlertDefinition>>;

    /// 정의를 생성하거나 수정합니다. 저장된 트리거 기록은 유지됩니다.
    async fn upsert(&self, definition: AlertDefinition) -> StoreResult<()>;

    /// `event_id`가 `at` 시각에 `definition_id`에 매칭되었음을 기록합니다.
    async fn record_trigger(
        &self,
        definition_id: Uuid,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<TriggerOutcome>;
}

/// 정의별로 기억하는 최근 적용 이벤트 수
pub const DEFAULT_APPLIED_EVENT_RETENTION: usize = 10_000;

/// 최근에 적용된 이벤트 ID (오래된 순으로 밀려남)
struct AppliedEvents {
    ids: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl AppliedEvents {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// 처음 보는 ID면 true
    fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

struct Slot {
    definition: AlertDefinition,
    applied_events: AppliedEvents,
}

/// 정의마다 mutex 하나를 두는 인메모리 저장소
///
/// 중복 확인은 정의별 최근 `retention`개 이벤트까지만 기억합니다.
pub struct InMemoryAlertStore {
    slots: RwLock<HashMap<Uuid, Arc<Mutex<Slot>>>>,
    retention: usize,
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_APPLIED_EVENT_RETENTION)
    }
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            retention,
        }
    }

    /// 정의를 미리 넣은 저장소를 생성합니다.
    pub async fn with_definitions(definitions: impl IntoIterator<Item = AlertDefinition>) -> Self {
        let store = Self::new();
        for definition in definitions {
            // upsert on the in-memory store cannot fail
            let _ = store.upsert(definition).await;
        }
        store
    }

    async fn slot(&self, id: Uuid) -> Option<Arc<Mutex<Slot>>> {
        self.slots.read().await.get(&id).cloned()
    }

    async fn snapshot(&self, only_active: bool) -> Vec<AlertDefinition> {
        let slots: Vec<_> = self.slots.read().await.values().cloned().collect();

        let mut definitions = Vec::with_capacity(slots.len());
        for slot in slots {
            let slot = slot.lock().await;
            if !only_active || slot.definition.is_active {
                definitions.push(slot.definition.clone());
            }
        }
        definitions
    }
}

#[async_trait]
impl AlertDefinitionStore for InMemoryAlertStore {
    async fn list_active(&self) -> StoreResult<Vec<AlertDefinition>> {
        Ok(self.snapshot(true).await)
    }

    async fn list_all(&self) -> StoreResult<Vec<AlertDefinition>> {
        Ok(self.snapshot(false).await)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<AlertDefinition>> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.definition.clone())),
            None => Ok(None),
        }
    }

    async fn upsert(&self, mut definition: AlertDefinition) -> StoreResult<()> {
        let mut slots = self.slots.write().await;

        match slots.get(&definition.id) {
            Some(existing) => {
                let mut slot = existing.lock().await;
                definition.trigger_count = slot.definition.trigger_count;
                definition.last_triggered = slot.definition.last_triggered;
                slot.definition = definition;
            }
            None => {
                slots.insert(
                    definition.id,
                    Arc::new(Mutex::new(Slot {
                        definition,
                        applied_events: AppliedEvents::new(self.retention),
                    })),
                );
            }
        }

        Ok(())
    }

    async fn record_trigger(
        &self,
        definition_id: Uuid,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<TriggerOutcome> {
        let slot = self
            .slot(definition_id)
            .await
            .ok_or(StoreError::NotFound(definition_id))?;

        let mut slot = slot.lock().await;

        if !slot.applied_events.insert(event_id) {
            debug!(
                definition_id = %definition_id,
                event_id = %event_id,
                "Trigger already recorded, skipping"
            );
            return Ok(TriggerOutcome::AlreadyApplied);
        }

        slot.definition.apply_trigger(at);

        Ok(TriggerOutcome::Applied {
            trigger_count: slot.definition.trigger_count,
        })
    }
}
