//! Discord webhook notifier for triggered alerts
//!
//! 알림 매칭 1건당 Embed 메시지 1개를 전송합니다. 색상은 심각도에 따라 달라집니다.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument};

use super::{NotificationSink, SinkError};
use crate::alert::{AlertMatch, Severity};

/// Discord webhook message payload
#[derive(Debug, Serialize)]
pub struct DiscordMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<DiscordEmbed>>,
}

/// Discord embed for rich messages
#[derive(Debug, Clone, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    /// Color (as decimal integer)
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<DiscordEmbedField>>,
    /// ISO 8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscordEmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Discord color constants (decimal)
pub mod colors {
    /// Critical - red
    pub const CRITICAL: u32 = 15158332; // #E74C3C
    /// High - orange
    pub const HIGH: u32 = 15105570; // #E67E22
    /// Medium - yellow
    pub const MEDIUM: u32 = 16776960; // #FFFF00
    /// Low - blue
    pub const LOW: u32 = 3447003; // #3498DB
}

/// 웹훅 요청 타임아웃
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Discord 알림 전송기
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    webhook_url: String,
    client: Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, SinkError> {
        Self::with_timeout(webhook_url, DEFAULT_WEBHOOK_TIMEOUT)
    }

    pub fn with_timeout(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
        })
    }

    pub fn severity_color(severity: Severity) -> u32 {
        match severity {
            Severity::Critical => colors::CRITICAL,
            Severity::High => colors::HIGH,
            Severity::Medium => colors::MEDIUM,
            Severity::Low => colors::LOW,
        }
    }

    fn severity_emoji(severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => ":red_circle:",
            Severity::High => ":orange_circle:",
            Severity::Medium => ":yellow_circle:",
            Severity::Low => ":blue_circle:",
        }
    }

    /// Build the webhook payload for one alert match
    pub fn build_message(alert: &AlertMatch) -> DiscordMessage {
        let fields = vec![
            DiscordEmbedField {
                name: "Severity".to_string(),
                value: alert.severity.to_string(),
                inline: true,
            },
            DiscordEmbedField {
                name: "Definition ID".to_string(),
                value: alert.definition_id.to_string(),
                inline: true,
            },
            DiscordEmbedField {
                name: "Event ID".to_string(),
                value: alert.event_id.to_string(),
                inline: false,
            },
        ];

        let embed = DiscordEmbed {
            title: format!(
                "{} Alert: {}",
                Self::severity_emoji(alert.severity),
                alert.definition_name
            ),
            description: format!("알림 조건이 충족되었습니다: {}", alert.definition_name),
            color: Self::severity_color(alert.severity),
            fields: Some(fields),
            timestamp: Some(alert.timestamp.to_rfc3339()),
        };

        DiscordMessage {
            content: None,
            embeds: Some(vec![embed]),
        }
    }

    async fn send_payload(&self, payload: &DiscordMessage) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send Discord webhook");
                SinkError::from(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Discord webhook returned error");
            return Err(SinkError::from_status(status, &body));
        }

        info!("Discord alert sent successfully");
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for DiscordNotifier {
    #[instrument(skip(self, alert), fields(definition_id = %alert.definition_id, event_id = %alert.event_id))]
    async fn notify(&self, alert: &AlertMatch) -> Result<(), SinkError> {
        self.send_payload(&Self::build_message(alert)).await
    }
}
