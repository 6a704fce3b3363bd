//! Elasticsearch 호환 검색 싱크 (HTTP)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use super::{SearchSink, SinkError};
use crate::event::{Event, Payload};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 이벤트 1건당 문서 1개
#[derive(Debug, Serialize)]
pub struct SearchDocument<'a> {
    pub event_id: Uuid,
    pub event_type: &'a str,
    pub source_id: Option<&'a str>,
    pub payload: &'a Payload,
    pub metadata: &'a Payload,
    pub timestamp: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub indexed_at: DateTime<Utc>,
}

impl<'a> From<&'a Event> for SearchDocument<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            event_id: event.id,
            event_type: &event.event_type,
            source_id: event.source_id.as_deref(),
            payload: &event.payload,
            metadata: &event.metadata,
            timestamp: event.timestamp,
            processed_at: event.processed_at,
            indexed_at: Utc::now(),
        }
    }
}

/// `PUT /{index}/_doc/{event_id}`로 색인합니다. 같은 ID로 재전달하면 덮어씁니다.
#[derive(Debug, Clone)]
pub struct HttpSearchIndex {
    base_url: String,
    index: String,
    client: Client,
}

impl HttpSearchIndex {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            base_url: base_url.into(),
            index: index.into(),
            client,
        })
    }

    pub fn document_url(&self, event_id: Uuid) -> String {
        format!(
            "{}/{}/_doc/{}",
            self.base_url.trim_end_matches('/'),
            self.index,
            event_id
        )
    }
}

#[async_trait]
impl SearchSink for HttpSearchIndex {
    async fn index(&self, event: &Event) -> Result<(), SinkError> {
        let url = self.document_url(event.id);

        let response = self
            .client
            .put(&url)
            .json(&SearchDocument::from(event))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, event_id = %event.id, "Failed to reach search index");
                SinkError::from(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Search index returned error");
            return Err(SinkError::from_status(status, &body));
        }

        debug!(event_id = %event.id, index = %self.index, "Event indexed");
        Ok(())
    }
}
