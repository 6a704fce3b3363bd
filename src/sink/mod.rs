//! 하위 싱크: 아카이브, 검색, 버스, 알림 전송, 일간 집계

pub mod archive;
pub mod bus;
pub mod discord;
pub mod notifier;
pub mod search;
pub mod summary;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::alert::AlertMatch;
use crate::event::Event;

pub use archive::FileArchive;
pub use bus::{BroadcastBus, BusMessage};
pub use discord::DiscordNotifier;
pub use notifier::FanOutNotifier;
pub use search::HttpSearchIndex;
pub use summary::{EventSummary, InMemorySummary, SummarySink};

/// Fan-out 싱크 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Archive,
    Search,
    Bus,
}

impl SinkKind {
    pub const ALL: [SinkKind; 3] = [SinkKind::Archive, SinkKind::Search, SinkKind::Bus];

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Archive => "archive",
            SinkKind::Search => "search",
            SinkKind::Bus => "bus",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink unreachable: {0}")]
    Unreachable(String),
    #[error("sink timed out: {0}")]
    Timeout(String),
    #[error("sink rejected the request: {0}")]
    Rejected(String),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// 재시도하면 성공할 수도 있는 에러인지
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SinkError::Unreachable(_) | SinkError::Timeout(_) | SinkError::Io(_)
        )
    }

    /// 실패 HTTP 응답을 분류합니다.
    ///
    /// 5xx and 429 are transient, other statuses mean the request itself was refused.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = format!("{} - {}", status, body);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            SinkError::Unreachable(detail)
        } else {
            SinkError::Rejected(detail)
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SinkError::Timeout(err.to_string())
        } else {
            SinkError::Unreachable(err.to_string())
        }
    }
}

/// 이벤트 영구 저장소 (같은 이벤트를 두 번 써도 무해해야 함)
#[async_trait]
pub trait ArchivalSink: Send + Sync {
    async fn store(&self, event: &Event) -> Result<(), SinkError>;
}

/// 검색 / 집계 인덱스
#[async_trait]
pub trait SearchSink: Send + Sync {
    async fn index(&self, event: &Event) -> Result<(), SinkError>;
}

/// Pub/sub 발행
#[async_trait]
pub trait BusSink: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, event: &Event) -> Result<(), SinkError>;
}

/// 발생한 알림 수신
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, alert: &AlertMatch) -> Result<(), SinkError>;
}
