//! tokio broadcast 채널 기반 인프로세스 메시지 버스

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{BusSink, NotificationSink, SinkError};
use crate::alert::{AlertMatch, Severity};
use crate::event::Event;

/// 발행된 메시지 1건
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusMessage {
    pub topic: String,
    pub key: String,
    pub payload: Value,
}

/// 알림 토픽으로 발행되는 알림 레코드
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertMessage {
    alert_id: Uuid,
    alert_name: String,
    severity: Severity,
    triggered_by_event: Uuid,
    timestamp: DateTime<Utc>,
}

impl From<&AlertMatch> for AlertMessage {
    fn from(alert: &AlertMatch) -> Self {
        Self {
            alert_id: alert.definition_id,
            alert_name: alert.definition_name.clone(),
            severity: alert.severity,
            triggered_by_event: alert.event_id,
            timestamp: alert.timestamp,
        }
    }
}

/// 브로드캐스트 버스 (구독자가 없어도 발행은 성공)
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<BusMessage>,
    alert_topic: String,
}

impl BroadcastBus {
    pub fn new(capacity: usize, alert_topic: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            alert_topic: alert_topic.into(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    fn send(&self, message: BusMessage) {
        let topic = message.topic.clone();
        match self.sender.send(message) {
            Ok(receivers) => debug!(topic = %topic, receivers, "Message published"),
            Err(_) => debug!(topic = %topic, "Message published without subscribers"),
        }
    }
}

#[async_trait]
impl BusSink for BroadcastBus {
    async fn publish(&self, topic: &str, key: &str, event: &Event) -> Result<(), SinkError> {
        let payload = serde_json::to_value(event)?;
        self.send(BusMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            payload,
        });
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for BroadcastBus {
    async fn notify(&self, alert: &AlertMatch) -> Result<(), SinkError> {
        let payload = serde_json::to_value(AlertMessage::from(alert))?;
        self.send(BusMessage {
            topic: self.alert_topic.clone(),
            key: alert.severity.as_str().to_string(),
            payload,
        });
        Ok(())
    }
}
