//! Fan-out: 보강된 이벤트를 설정된 싱크로 전달합니다.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::PipelineError;
use crate::event::Event;
use crate::sink::{ArchivalSink, BusSink, SearchSink, SinkError, SinkKind};

/// 이벤트 발행 기본 토픽
pub const DEFAULT_EVENT_TOPIC: &str = "datapulse-events";

/// 싱크 1개에 대한 전달 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    Delivered,
    /// 설정되지 않은 싱크
    Skipped,
    /// 이전 시도에서 이미 전달됨
    AlreadyDelivered,
    Failed { reason: String, transient: bool },
}

impl SinkOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SinkOutcome::Delivered | SinkOutcome::AlreadyDelivered)
    }
}

/// 한 번의 dispatch에 대한 싱크별 결과
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutReport {
    pub event_id: Uuid,
    pub outcomes: Vec<(SinkKind, SinkOutcome)>,
}

impl FanOutReport {
    pub fn outcome(&self, kind: SinkKind) -> Option<&SinkOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    pub fn delivered(&self) -> Vec<SinkKind> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_delivered())
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn failed(&self) -> Vec<SinkKind> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SinkOutcome::Failed { .. }))
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().len()
    }

    /// 재시도할 만한 첫 번째 실패를 파이프라인 에러로 반환합니다.
    pub fn transient_failure(&self) -> Option<PipelineError> {
        self.outcomes.iter().find_map(|(kind, outcome)| match outcome {
            SinkOutcome::Failed {
                reason,
                transient: true,
            } => Some(PipelineError::SinkUnavailable {
                sink: *kind,
                reason: reason.clone(),
            }),
            _ => None,
        })
    }
}

/// archive, search, bus 싱크에 이벤트를 각각 독립적으로 전달합니다.
///
/// 성공한 `(event_id, sink)` 전달은 [`forget`](Self::forget) 호출 전까지 기억하며,
/// 재시도 시 실패한 싱크만 다시 시도합니다.
pub struct FanOutDispatcher {
    archive: Option<Arc<dyn ArchivalSink>>,
    search: Option<Arc<dyn SearchSink>>,
    bus: Option<Arc<dyn BusSink>>,
    bus_topic: String,
    delivered: RwLock<HashSet<(Uuid, SinkKind)>>,
}

impl Default for FanOutDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FanOutDispatcher {
    /// 싱크가 없는 dispatcher
    pub fn new() -> Self {
        Self {
            archive: None,
            search: None,
            bus: None,
            bus_topic: DEFAULT_EVENT_TOPIC.to_string(),
            delivered: RwLock::new(HashSet::new()),
        }
    }

    pub fn with_archive(mut self, sink: Arc<dyn ArchivalSink>) -> Self {
        self.archive = Some(sink);
        self
    }

    pub fn with_search(mut self, sink: Arc<dyn SearchSink>) -> Self {
        self.search = Some(sink);
        self
    }

    pub fn with_bus(mut self, sink: Arc<dyn BusSink>, topic: impl Into<String>) -> Self {
        self.bus = Some(sink);
        self.bus_topic = topic.into();
        self
    }

    /// 모든 싱크에 전달합니다. 실패해도 중단하지 않습니다.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn dispatch(&self, event: &Event) -> FanOutReport {
        let outcomes = join_all(SinkKind::ALL.iter().map(|kind| async move {
            (*kind, self.deliver(*kind, event).await)
        }))
        .await;

        FanOutReport {
            event_id: event.id,
            outcomes,
        }
    }

    /// 이벤트가 종료 상태가 되면 전달 기록을 지웁니다.
    pub async fn forget(&self, event_id: Uuid) {
        self.delivered
            .write()
            .await
            .retain(|(id, _)| *id != event_id);
    }

    async fn deliver(&self, kind: SinkKind, event: &Event) -> SinkOutcome {
        if self.delivered.read().await.contains(&(event.id, kind)) {
            debug!(sink = %kind, "Already delivered, skipping");
            return SinkOutcome::AlreadyDelivered;
        }

        let result: Result<(), SinkError> = match kind {
            SinkKind::Archive => match &self.archive {
                Some(sink) => sink.store(event).await,
                None => return SinkOutcome::Skipped,
            },
            SinkKind::Search => match &self.search {
                Some(sink) => sink.index(event).await,
                None => return SinkOutcome::Skipped,
            },
            SinkKind::Bus => match &self.bus {
                Some(sink) => sink.publish(&self.bus_topic, &event.event_type, event).await,
                None => return SinkOutcome::Skipped,
            },
        };

        match result {
            Ok(()) => {
                self.delivered.write().await.insert((event.id, kind));
                debug!(sink = %kind, "Event delivered");
                SinkOutcome::Delivered
            }
            Err(e) => {
                warn!(sink = %kind, error = %e, "Sink delivery failed");
                metrics::counter!("pipeline_sink_failures_total", "sink" => kind.as_str())
                    .increment(1);
                SinkOutcome::Failed {
                    reason: e.to_string(),
                    transient: e.is_transient(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::payload_from;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSink {
        fn result(&self) -> Result<(), SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SinkError::Unreachable("connection refused".into()))
            } else {
                Ok(())
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArchivalSink for CountingSink {
        async fn store(&self, _event: &Event) -> Result<(), SinkError> {
            self.result()
        }
    }

    #[async_trait]
    impl SearchSink for CountingSink {
        async fn index(&self, _event: &Event) -> Result<(), SinkError> {
            self.result()
        }
    }

    #[async_trait]
    impl BusSink for CountingSink {
        async fn publish(&self, _topic: &str, _key: &str, _event: &Event) -> Result<(), SinkError> {
            self.result()
        }
    }

    fn sink(fail: bool) -> Arc<CountingSink> {
        Arc::new(CountingSink {
            fail,
            ..Default::default()
        })
    }

    fn event() -> Event {
        Event::new("api_call", payload_from(json!({"value": 120})))
    }

    #[tokio::test]
    async fn should_deliver_to_healthy_sinks_when_bus_fails() {
        // Arrange
        let archive = sink(false);
        let search = sink(false);
        let bus = sink(true);
        let dispatcher = FanOutDispatcher::new()
            .with_archive(archive.clone())
            .with_search(search.clone())
            .with_bus(bus.clone(), "datapulse-events");

        // Act
        let report = dispatcher.dispatch(&event()).await;

        // Assert
        assert_eq!(report.outcome(SinkKind::Archive), Some(&SinkOutcome::Delivered));
        assert_eq!(report.outcome(SinkKind::Search), Some(&SinkOutcome::Delivered));
        assert!(matches!(
            report.outcome(SinkKind::Bus),
            Some(SinkOutcome::Failed { transient: true, .. })
        ));
        assert_eq!(report.failed(), vec![SinkKind::Bus]);
        assert_eq!(archive.calls(), 1);
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn should_skip_unprovisioned_sinks_silently() {
        let dispatcher = FanOutDispatcher::new().with_archive(sink(false));

        let report = dispatcher.dispatch(&event()).await;

        assert_eq!(report.outcome(SinkKind::Search), Some(&SinkOutcome::Skipped));
        assert_eq!(report.outcome(SinkKind::Bus), Some(&SinkOutcome::Skipped));
        assert_eq!(report.failed_count(), 0);
        assert!(report.transient_failure().is_none());
    }

    #[tokio::test]
    async fn should_not_redeliver_on_second_dispatch() {
        // Arrange
        let archive = sink(false);
        let bus = sink(true);
        let dispatcher = FanOutDispatcher::new()
            .with_archive(archive.clone())
            .with_bus(bus.clone(), "t");
        let event = event();

        // Act
        dispatcher.dispatch(&event).await;
        let second = dispatcher.dispatch(&event).await;

        // Assert
        assert_eq!(archive.calls(), 1);
        assert_eq!(bus.calls(), 2);
        assert_eq!(
            second.outcome(SinkKind::Archive),
            Some(&SinkOutcome::AlreadyDelivered)
        );
        assert!(matches!(
            second.transient_failure(),
            Some(PipelineError::SinkUnavailable { sink: SinkKind::Bus, .. })
        ));
    }

    #[tokio::test]
    async fn should_redeliver_after_forget() {
        let archive = sink(false);
        let dispatcher = FanOutDispatcher::new().with_archive(archive.clone());
        let event = event();

        dispatcher.dispatch(&event).await;
        dispatcher.forget(event.id).await;
        dispatcher.dispatch(&event).await;

        assert_eq!(archive.calls(), 2);
    }
}
