//! 재시도를 모두 소진한 이벤트의 DLQ
//!
//! 실패한 이벤트는 운영자가 확인할 수 있도록 보관하며, 자동으로 재처리하지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::event::Event;
use crate::sink::SinkError;

/// 운영자 확인용으로 보관하는 실패 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedEvent {
    pub event: Event,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl FailedEvent {
    pub fn new(event: Event, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            event,
            error: error.into(),
            attempts,
            failed_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
    async fn push(&self, failed: FailedEvent) -> Result<(), SinkError>;

    /// 실패 이벤트 목록 (오래된 순)
    async fn list(&self) -> Result<Vec<FailedEvent>, SinkError>;

    async fn len(&self) -> Result<usize, SinkError> {
        Ok(self.list().await?.len())
    }
}

#[derive(Default)]
pub struct InMemoryDeadLetter {
    entries: RwLock<Vec<FailedEvent>>,
}

impl InMemoryDeadLetter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterQueue for InMemoryDeadLetter {
    async fn push(&self, failed: FailedEvent) -> Result<(), SinkError> {
        self.entries.write().await.push(failed);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FailedEvent>, SinkError> {
        Ok(self.entries.read().await.clone())
    }

    async fn len(&self) -> Result<usize, SinkError> {
        Ok(self.entries.read().await.len())
    }
}

/// `dlq_dir/` 아래 실패 이벤트마다 JSON 파일 1개
pub struct FileDeadLetter {
    dir: PathBuf,
}

impl FileDeadLetter {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            error!(error = %e, dir = %dir.display(), "Failed to create dead-letter directory");
            SinkError::Io(e)
        })?;

        info!(dlq_dir = %dir.display(), "File dead-letter queue initialized");
        Ok(Self { dir })
    }

    fn path_for(&self, event_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", event_id))
    }
}

/// `<event_id>.json` 형식의 DLQ 파일인지 (임시 파일 제외)
fn is_entry_file(path: &std::path::Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("json")
        && path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| Uuid::parse_str(stem).is_ok())
}

#[async_trait]
impl DeadLetterQueue for FileDeadLetter {
    async fn push(&self, failed: FailedEvent) -> Result<(), SinkError> {
        let path = self.path_for(failed.event.id);
        let tmp_path = path.with_extension("json.tmp");

        let content = serde_json::to_vec_pretty(&failed)?;
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!(event_id = %failed.event.id, path = %path.display(), "Event moved to DLQ");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<FailedEvent>, SinkError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut failed = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_entry_file(&path) {
                continue;
            }

            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<FailedEvent>(&content) {
                Ok(event) => failed.push(event),
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Skipping unreadable DLQ entry");
                }
            }
        }

        failed.sort_by_key(|f| f.failed_at);
        Ok(failed)
    }

    /// 파일 내용을 읽지 않고 항목 파일 수만 셉니다.
    async fn len(&self) -> Result<usize, SinkError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut count = 0;

        while let Some(entry) = entries.next_entry().await? {
            if is_entry_file(&entry.path()) {
                count += 1;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::payload_from;
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;

    fn failed(error: &str) -> FailedEvent {
        FailedEvent::new(
            Event::new("purchase", payload_from(json!({"value": 1}))),
            error,
            3,
        )
    }

    #[tokio::test]
    async fn should_keep_pushed_events_in_memory() {
        let dlq = InMemoryDeadLetter::new();

        dlq.push(failed("store down")).await.unwrap();

        assert_eq!(dlq.len().await.unwrap(), 1);
        assert_eq!(dlq.list().await.unwrap()[0].error, "store down");
    }

    #[tokio::test]
    async fn should_persist_and_list_file_entries_oldest_first() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let dlq = FileDeadLetter::new(dir.path()).await.unwrap();
        let mut older = failed("first");
        older.failed_at = Utc::now() - Duration::minutes(5);
        let newer = failed("second");

        // Act
        dlq.push(newer.clone()).await.unwrap();
        dlq.push(older.clone()).await.unwrap();
        let listed = dlq.list().await.unwrap();

        // Assert
        assert_eq!(listed, vec![older, newer]);
    }

    #[tokio::test]
    async fn should_skip_corrupt_files() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let dlq = FileDeadLetter::new(dir.path()).await.unwrap();
        dlq.push(failed("ok")).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        // Act
        let listed = dlq.list().await.unwrap();

        // Assert
        assert_eq!(listed.len(), 1);
        assert_eq!(dlq.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_count_entries_without_reading_them() {
        // Arrange
        let dir = TempDir::new().unwrap();
        let dlq = FileDeadLetter::new(dir.path()).await.unwrap();
        for _ in 0..3 {
            dlq.push(failed("sink down")).await.unwrap();
        }
        // 내용은 읽지 않으므로 이름만 맞으면 셉니다
        std::fs::write(dir.path().join(format!("{}.json", Uuid::new_v4())), "").unwrap();
        std::fs::write(dir.path().join(format!("{}.json.tmp", Uuid::new_v4())), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore").unwrap();

        // Act
        let count = dlq.len().await.unwrap();

        // Assert
        assert_eq!(count, 4);
        assert_eq!(dlq.list().await.unwrap().len(), 3);
    }
}
