//! 파일 기반 아카이브 싱크
//!
//! 디렉토리 구조:
//! ```text
//! archive_dir/
//! └── processed/YYYY/MM/DD/{event_type}/{event_id}.json
//! ```
//!
//! 임시 파일에 쓴 뒤 rename 하므로 재전달은 기존 파일을 덮어씁니다.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{ArchivalSink, SinkError};
use crate::event::Event;

pub struct FileArchive {
    root: PathBuf,
}

impl FileArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!(archive_dir = %root.display(), "File archive initialized");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 발생 날짜와 이벤트 타입으로 나눈 아카이브 경로
    pub fn path_for(&self, event: &Event) -> PathBuf {
        self.root
            .join("processed")
            .join(event.timestamp.format("%Y/%m/%d").to_string())
            .join(sanitize_segment(&event.event_type))
            .join(event.to_filename())
    }
}

/// 이벤트 타입을 경로 세그먼트 하나로 쓸 수 있게 정리합니다.
fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl ArchivalSink for FileArchive {
    async fn store(&self, event: &Event) -> Result<(), SinkError> {
        let path = self.path_for(event);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        fs::create_dir_all(&dir).await.map_err(|e| {
            error!(error = %e, dir = %dir.display(), "Failed to create archive directory");
            SinkError::Io(e)
        })?;

        let content = serde_json::to_vec_pretty(event)?;

        let tmp_path = dir.join(format!("{}.{}.tmp", event.id, Uuid::new_v4().simple()));
        fs::write(&tmp_path, content).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            error!(error = %e, path = %path.display(), "Failed to move archived event into place");
            return Err(SinkError::Io(e));
        }

        debug!(event_id = %event.id, path = %path.display(), "Event archived");
        Ok(())
    }
}
