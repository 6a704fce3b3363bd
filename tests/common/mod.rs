//! 통합 테스트용 싱크와 파이프라인 구성 헬퍼
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datapulse_server::alert::{
    AlertDefinition, AlertDefinitionStore, AlertEvaluator, AlertMatch, InMemoryAlertStore,
    StoreError, StoreResult, TriggerOutcome,
};
use datapulse_server::event::Event;
use datapulse_server::pipeline::{EventPipeline, FanOutDispatcher, InMemoryDeadLetter, RetryPolicy};
use datapulse_server::sink::{
    ArchivalSink, BusSink, InMemorySummary, NotificationSink, SearchSink, SinkError,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// 받은 이벤트를 기록하는 싱크. `fail_first`번까지는 일시적 에러를 반환합니다.
#[derive(Default)]
pub struct RecordingSink {
    pub received: Mutex<Vec<Event>>,
    fail_first: u32,
    calls: AtomicU32,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_first(times: u32) -> Arc<Self> {
        Arc::new(Self {
            fail_first: times,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn count(&self) -> usize {
        self.received.lock().await.len()
    }

    async fn receive(&self, event: &Event) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.fail_first {
            return Err(SinkError::Unreachable(format!("call {} refused", call)));
        }
        self.received.lock().await.push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl ArchivalSink for RecordingSink {
    async fn store(&self, event: &Event) -> Result<(), SinkError> {
        self.receive(event).await
    }
}

#[async_trait]
impl SearchSink for RecordingSink {
    async fn index(&self, event: &Event) -> Result<(), SinkError> {
        self.receive(event).await
    }
}

#[async_trait]
impl BusSink for RecordingSink {
    async fn publish(&self, _topic: &str, _key: &str, event: &Event) -> Result<(), SinkError> {
        self.receive(event).await
    }
}

/// 항상 연결에 실패하는 싱크
pub struct DownSink;

#[async_trait]
impl BusSink for DownSink {
    async fn publish(&self, _topic: &str, _key: &str, _event: &Event) -> Result<(), SinkError> {
        Err(SinkError::Unreachable("broker down".into()))
    }
}

#[async_trait]
impl ArchivalSink for DownSink {
    async fn store(&self, _event: &Event) -> Result<(), SinkError> {
        Err(SinkError::Unreachable("disk unavailable".into()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub alerts: Mutex<Vec<AlertMatch>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, alert: &AlertMatch) -> Result<(), SinkError> {
        self.alerts.lock().await.push(alert.clone());
        Ok(())
    }
}

/// 목록 조회가 항상 연결 에러로 실패하는 저장소
pub struct UnavailableStore;

#[async_trait]
impl AlertDefinitionStore for UnavailableStore {
    async fn list_active(&self) -> StoreResult<Vec<AlertDefinition>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn list_all(&self) -> StoreResult<Vec<AlertDefinition>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _id: Uuid) -> StoreResult<Option<AlertDefinition>> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn upsert(&self, _definition: AlertDefinition) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn record_trigger(
        &self,
        _definition_id: Uuid,
        _event_id: Uuid,
        _at: DateTime<Utc>,
    ) -> StoreResult<TriggerOutcome> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// 특정 정의의 첫 `record_trigger`만 연결 에러로 실패시키는 저장소.
/// 실패할 정의는 목록의 마지막에 오도록 정렬합니다.
pub struct FlakyStore {
    pub inner: Arc<InMemoryAlertStore>,
    flaky_id: Uuid,
    failed_once: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryAlertStore>, flaky_id: Uuid) -> Self {
        Self {
            inner,
            flaky_id,
            failed_once: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AlertDefinitionStore for FlakyStore {
    async fn list_active(&self) -> StoreResult<Vec<AlertDefinition>> {
        let mut definitions = self.inner.list_active().await?;
        definitions.sort_by_key(|d| d.id == self.flaky_id);
        Ok(definitions)
    }

    async fn list_all(&self) -> StoreResult<Vec<AlertDefinition>> {
        self.inner.list_all().await
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<AlertDefinition>> {
        self.inner.get(id).await
    }

    async fn upsert(&self, definition: AlertDefinition) -> StoreResult<()> {
        self.inner.upsert(definition).await
    }

    async fn record_trigger(
        &self,
        definition_id: Uuid,
        event_id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<TriggerOutcome> {
        if definition_id == self.flaky_id && !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("lock wait timeout".into()));
        }
        self.inner.record_trigger(definition_id, event_id, at).await
    }
}

/// 테스트가 오래 걸리지 않도록 짧은 백오프를 사용합니다.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

pub struct Harness {
    pub pipeline: Arc<EventPipeline>,
    pub store: Arc<InMemoryAlertStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub dead_letters: Arc<InMemoryDeadLetter>,
    pub summary: Arc<InMemorySummary>,
}

pub async fn harness(
    dispatcher: FanOutDispatcher,
    definitions: Vec<AlertDefinition>,
    policy: RetryPolicy,
) -> Harness {
    let store = Arc::new(InMemoryAlertStore::with_definitions(definitions).await);
    let notifier = Arc::new(RecordingNotifier::default());
    let dead_letters = Arc::new(InMemoryDeadLetter::new());
    let summary = Arc::new(InMemorySummary::new());

    let pipeline = EventPipeline::new(
        dispatcher,
        AlertEvaluator::new(store.clone(), notifier.clone()),
        dead_letters.clone(),
    )
    .with_summary(summary.clone())
    .with_retry_policy(policy);

    Harness {
        pipeline: Arc::new(pipeline),
        store,
        notifier,
        dead_letters,
        summary,
    }
}
