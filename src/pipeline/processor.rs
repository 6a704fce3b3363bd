//! Event pipeline: Intake → Enrichment → {Fan-out ∥ Alert evaluation} → processed
//!
//! ## 처리 흐름
//!
//! 1. Intake 검증 (실패 시 즉시 `Rejected`, 재시도 없음)
//! 2. Enrichment + Fan-out + 알림 평가를 하나의 단위로 재시도
//! 3. 재시도 소진 시 DLQ 로 이동 (`processed=false` 유지)
//!
//! 취소 신호는 싱크 쓰기가 시작되기 전까지만 확인합니다. 싱크 단계가 시작된
//! 이벤트는 끝까지 처리됩니다.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dead_letter::{DeadLetterQueue, FailedEvent};
use super::dispatcher::{FanOutDispatcher, FanOutReport};
use super::retry::{with_retry, RetryPolicy};
use super::PipelineError;
use crate::alert::{AlertEvaluator, AlertMatch};
use crate::event::{enrich, intake, Event, RawEvent};
use crate::sink::SummarySink;

/// 배치 처리 시 동시에 처리하는 기본 이벤트 수
pub const DEFAULT_WORKER_CONCURRENCY: usize = 16;

/// 처리 완료된 이벤트
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    /// `processed = true`인 보강된 이벤트
    pub event: Event,
    /// 마지막 시도의 Fan-out 결과
    pub fanout: FanOutReport,
    /// 모든 시도에서 적용된 매칭
    pub alerts: Vec<AlertMatch>,
    pub attempts: u32,
}

impl ProcessedEvent {
    /// 전달받지 못한 싱크가 있는지
    pub fn is_partial(&self) -> bool {
        self.fanout.failed_count() > 0
    }
}

/// 배치의 이벤트별 결과
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Processed(ProcessedEvent),
    /// 재시도 소진 또는 영구 실패 (DLQ로 이동됨)
    Failed {
        event_id: Uuid,
        error: String,
        attempts: u32,
    },
    /// Intake 검증 실패
    Rejected { reason: String },
    /// 싱크 쓰기 전에 취소됨
    Cancelled,
}

impl EventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventOutcome::Processed(_) => "processed",
            EventOutcome::Failed { .. } => "failed",
            EventOutcome::Rejected { .. } => "rejected",
            EventOutcome::Cancelled => "cancelled",
        }
    }
}

/// 한 이벤트의 시도들이 공유하는 상태
#[derive(Default)]
struct RunState {
    enriched: Option<Event>,
    report: Option<FanOutReport>,
    alerts: Vec<AlertMatch>,
    attempts: u32,
    sink_phase_started: bool,
}

pub struct EventPipeline {
    dispatcher: FanOutDispatcher,
    evaluator: AlertEvaluator,
    dead_letters: Arc<dyn DeadLetterQueue>,
    summary: Option<Arc<dyn SummarySink>>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl EventPipeline {
    pub fn new(
        dispatcher: FanOutDispatcher,
        evaluator: AlertEvaluator,
        dead_letters: Arc<dyn DeadLetterQueue>,
    ) -> Self {
        Self {
            dispatcher,
            evaluator,
            dead_letters,
            summary: None,
            policy: RetryPolicy::default(),
            concurrency: DEFAULT_WORKER_CONCURRENCY,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 처리 완료된 이벤트를 타입별 일간 카운터에 기록합니다.
    pub fn with_summary(mut self, summary: Arc<dyn SummarySink>) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn summary(&self) -> Option<&Arc<dyn SummarySink>> {
        self.summary.as_ref()
    }

    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterQueue> {
        &self.dead_letters
    }

    pub fn evaluator(&self) -> &AlertEvaluator {
        &self.evaluator
    }

    /// 처리 없이 수집 요청만 검증합니다.
    pub fn ingest(&self, raw: RawEvent) -> Result<Event, PipelineError> {
        intake::accept(raw)
    }

    /// 수집 요청 1건을 전체 파이프라인으로 처리합니다.
    ///
    /// 검증 실패는 [`PipelineError::Validation`], 재시도 소진은 DLQ 이동 후
    /// [`PipelineError::Permanent`]를 반환합니다.
    pub async fn process(&self, raw: RawEvent) -> Result<ProcessedEvent, PipelineError> {
        let event = self.ingest(raw)?;
        self.process_event(event, None).await
    }

    /// 검증된 이벤트를 Enrichment, Fan-out, 알림 평가로 처리합니다.
    pub async fn process_event(
        &self,
        event: Event,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<ProcessedEvent, PipelineError> {
        self.execute(event, cancel).await.map_err(|(err, _)| err)
    }

    #[instrument(skip(self, event, cancel), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn execute(
        &self,
        event: Event,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<ProcessedEvent, (PipelineError, u32)> {
        let state = Mutex::new(RunState::default());
        let event_ref = &event;
        let state_ref = &state;

        let result = with_retry(&self.policy, move |attempt| {
            self.run_once(event_ref, attempt, state_ref, cancel)
        })
        .await;

        let state = state.into_inner();
        let attempts = state.attempts;
        let enriched = state.enriched.unwrap_or(event);

        match result {
            Ok(()) => Ok(self.finish(enriched, state.report, state.alerts, attempts).await),
            Err(PipelineError::SinkUnavailable { sink, reason }) => {
                // 싱크 실패만 남은 경우: 부분 전달로 처리 완료
                warn!(
                    sink = %sink,
                    attempts,
                    "Sink still failing after retries, completing with partial delivery: {}",
                    reason
                );
                Ok(self.finish(enriched, state.report, state.alerts, attempts).await)
            }
            Err(PipelineError::Cancelled) => {
                info!("Event cancelled before sink phase");
                metrics::counter!("pipeline_events_total", "outcome" => "cancelled").increment(1);
                Err((PipelineError::Cancelled, attempts))
            }
            Err(e) => Err((self.fail(enriched, e, attempts).await, attempts)),
        }
    }

    /// 여러 요청을 최대 `concurrency`개씩 동시에 처리합니다.
    ///
    /// 결과는 입력 순서대로 반환됩니다. `cancel`이 `true`가 되면 싱크 단계에
    /// 도달하지 않은 이벤트는 취소로 보고됩니다.
    pub async fn process_batch(
        &self,
        raws: Vec<RawEvent>,
        cancel: watch::Receiver<bool>,
    ) -> Vec<EventOutcome> {
        let cancel = &cancel;

        stream::iter(raws)
            .map(|raw| async move { self.process_one(raw, cancel).await })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn process_one(&self, raw: RawEvent, cancel: &watch::Receiver<bool>) -> EventOutcome {
        if *cancel.borrow() {
            return EventOutcome::Cancelled;
        }

        let event = match self.ingest(raw) {
            Ok(event) => event,
            Err(e) => {
                metrics::counter!("pipeline_events_total", "outcome" => "rejected").increment(1);
                return EventOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        };
        let event_id = event.id;

        match self.execute(event, Some(cancel)).await {
            Ok(processed) => EventOutcome::Processed(processed),
            Err((PipelineError::Cancelled, _)) => EventOutcome::Cancelled,
            Err((e, attempts)) => EventOutcome::Failed {
                event_id,
                error: e.to_string(),
                attempts,
            },
        }
    }

    async fn run_once(
        &self,
        event: &Event,
        attempt: u32,
        state: &Mutex<RunState>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<(), PipelineError> {
        let enriched = {
            let mut state = state.lock().await;
            state.attempts = attempt;

            let enriched = enrich(state.enriched.as_ref().unwrap_or(event));

            if !state.sink_phase_started {
                if cancel.map(|rx| *rx.borrow()).unwrap_or(false) {
                    return Err(PipelineError::Cancelled);
                }
                state.sink_phase_started = true;
            }

            state.enriched = Some(enriched.clone());
            enriched
        };

        let (report, evaluation) = tokio::join!(
            self.dispatcher.dispatch(&enriched),
            self.evaluator.evaluate(&enriched)
        );

        let mut state = state.lock().await;
        let sink_failure = report.transient_failure();
        state.report = Some(report);

        // 이번 시도에서 새로 적용된 매칭만 돌아오므로 실패한 경우에도 먼저 누적합니다
        match evaluation {
            Ok(applied) => state.alerts.extend(applied),
            Err(failure) => {
                state.alerts.extend(failure.applied);
                return Err(failure.error);
            }
        }

        match sink_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn finish(
        &self,
        mut event: Event,
        report: Option<FanOutReport>,
        alerts: Vec<AlertMatch>,
        attempts: u32,
    ) -> ProcessedEvent {
        event.processed = true;
        self.dispatcher.forget(event.id).await;

        // 집계 실패는 처리 결과에 영향을 주지 않습니다
        if let Some(summary) = &self.summary {
            if let Err(e) = summary.record(&event).await {
                error!(event_id = %event.id, error = %e, "Failed to update event summary");
                metrics::counter!("summary_update_failures_total").increment(1);
            }
        }

        let fanout = report.unwrap_or_else(|| FanOutReport {
            event_id: event.id,
            outcomes: Vec::new(),
        });

        info!(
            event_id = %event.id,
            attempts,
            alerts = alerts.len(),
            failed_sinks = fanout.failed_count(),
            "Event processed"
        );
        metrics::counter!("pipeline_events_total", "outcome" => "processed").increment(1);

        ProcessedEvent {
            event,
            fanout,
            alerts,
            attempts,
        }
    }

    async fn fail(&self, event: Event, err: PipelineError, attempts: u32) -> PipelineError {
        let event_id = event.id;
        self.dispatcher.forget(event_id).await;

        error!(event_id = %event_id, attempts, error = %err, "Event processing failed, moving to DLQ");
        metrics::counter!("pipeline_events_total", "outcome" => "failed").increment(1);

        if let Err(e) = self
            .dead_letters
            .push(FailedEvent::new(event, err.to_string(), attempts))
            .await
        {
            error!(event_id = %event_id, error = %e, "Failed to write event to DLQ");
        }

        match err {
            PipelineError::Permanent(_) => err,
            other => PipelineError::Permanent(format!(
                "gave up after {} attempt(s): {}",
                attempts, other
            )),
        }
    }
}
