//! 알림 전송기 조합

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

use super::{NotificationSink, SinkError};
use crate::alert::AlertMatch;

/// 알림을 내부 전송기 각각에 독립적으로 전달합니다.
///
/// 하나가 실패해도 나머지는 계속 전송하며, 내부 전송기가 없으면 아무것도 하지 않습니다.
#[derive(Clone, Default)]
pub struct FanOutNotifier {
    notifiers: Vec<Arc<dyn NotificationSink>>,
}

impl FanOutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { notifiers }
    }

    pub fn push(&mut self, notifier: Arc<dyn NotificationSink>) {
        self.notifiers.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanOutNotifier {
    async fn notify(&self, alert: &AlertMatch) -> Result<(), SinkError> {
        let results = join_all(self.notifiers.iter().map(|n| n.notify(alert))).await;

        let mut first_error = None;
        let mut failed = 0usize;
        for err in results.into_iter().filter_map(Result::err) {
            warn!(definition_id = %alert.definition_id, "Notifier failed: {}", err);
            failed += 1;
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) if failed > 1 => Err(SinkError::Unreachable(format!(
                "{} of {} notifiers failed, first: {}",
                failed,
                self.notifiers.len(),
                err
            ))),
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
