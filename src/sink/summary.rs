//! 이벤트 타입별 일간 처리 건수 집계
//!
//! 처리 완료된 이벤트마다 (event_type, 처리 날짜) 카운터를 1 올립니다.
//! 재시도로 같은 이벤트가 여러 번 전달되어도 파이프라인은 완료 시 한 번만 기록합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use super::SinkError;
use crate::event::Event;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub event_type: String,
    /// UTC 처리 날짜
    pub date: NaiveDate,
    pub event_count: u64,
    pub last_updated: DateTime<Utc>,
}

#[async_trait]
pub trait SummarySink: Send + Sync {
    /// 처리 완료 이벤트 1건 집계
    async fn record(&self, event: &Event) -> Result<(), SinkError>;

    /// 날짜, 이벤트 타입 순으로 정렬된 집계
    async fn list(&self) -> Result<Vec<EventSummary>, SinkError>;
}

#[derive(Default)]
pub struct InMemorySummary {
    rows: Mutex<HashMap<(String, NaiveDate), EventSummary>>,
}

impl InMemorySummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, event_type: &str, date: NaiveDate) -> u64 {
        self.rows
            .lock()
            .await
            .get(&(event_type.to_string(), date))
            .map(|row| row.event_count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SummarySink for InMemorySummary {
    async fn record(&self, event: &Event) -> Result<(), SinkError> {
        let at = event.processed_at.unwrap_or_else(Utc::now);
        let date = at.date_naive();

        let mut rows = self.rows.lock().await;
        let row = rows
            .entry((event.event_type.clone(), date))
            .or_insert_with(|| EventSummary {
                event_type: event.event_type.clone(),
                date,
                event_count: 0,
                last_updated: at,
            });
        row.event_count += 1;
        row.last_updated = row.last_updated.max(at);

        Ok(())
    }

    async fn list(&self) -> Result<Vec<EventSummary>, SinkError> {
        let mut rows: Vec<_> = self.rows.lock().await.values().cloned().collect();
        rows.sort_by(|a, b| (a.date, &a.event_type).cmp(&(b.date, &b.event_type)));
        Ok(rows)
    }
}
