use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::alert::{AlertDefinitionStore, AlertEvaluator, InMemoryAlertStore, SeaOrmAlertStore};
use crate::config::{establish_connection, AppConfig};
use crate::pipeline::{
    DeadLetterQueue, EventPipeline, FanOutDispatcher, FileDeadLetter, InMemoryDeadLetter,
};
use crate::sink::{
    BroadcastBus, DiscordNotifier, FanOutNotifier, FileArchive, HttpSearchIndex, InMemorySummary,
    NotificationSink, SinkError, SummarySink,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EventPipeline>,
    pub alert_store: Arc<dyn AlertDefinitionStore>,
    /// `true` once graceful shutdown started
    pub shutdown: watch::Receiver<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("sink initialization failed: {0}")]
    Sink(#[from] SinkError),
}

impl AppState {
    pub fn new(pipeline: Arc<EventPipeline>, shutdown: watch::Receiver<bool>) -> Self {
        let alert_store = pipeline.evaluator().store().clone();
        Self {
            pipeline,
            alert_store,
            shutdown,
        }
    }

    pub fn dead_letters(&self) -> &Arc<dyn DeadLetterQueue> {
        self.pipeline.dead_letters()
    }

    pub fn summary(&self) -> Option<&Arc<dyn SummarySink>> {
        self.pipeline.summary()
    }

    /// 설정에 따라 저장소와 싱크를 구성합니다.
    ///
    /// 설정되지 않은 싱크는 비활성화되며, 저장소는 인메모리로 대체됩니다.
    pub async fn from_config(
        config: &AppConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, StartupError> {
        // 1. 알림 정의 저장소
        let alert_store: Arc<dyn AlertDefinitionStore> = match &config.database_url {
            Some(url) => Arc::new(SeaOrmAlertStore::new(establish_connection(url).await?)),
            None => Arc::new(InMemoryAlertStore::new()),
        };

        // 2. 알림 전송 (버스 + Discord)
        let bus = Arc::new(BroadcastBus::new(
            config.bus_capacity,
            config.bus_topic_alerts.clone(),
        ));
        let mut notifier = FanOutNotifier::new(vec![bus.clone() as Arc<dyn NotificationSink>]);
        if let Some(url) = &config.discord_webhook_url {
            notifier.push(Arc::new(DiscordNotifier::new(url.clone())?));
        }

        // 3. Fan-out 싱크
        let mut dispatcher = FanOutDispatcher::new().with_bus(bus, config.bus_topic_events.clone());
        if let Some(dir) = &config.archive_dir {
            dispatcher = dispatcher.with_archive(Arc::new(FileArchive::new(dir.clone())));
        }
        if let Some(url) = &config.search_url {
            dispatcher = dispatcher.with_search(Arc::new(HttpSearchIndex::new(
                url.clone(),
                config.search_index.clone(),
            )?));
        }

        // 4. DLQ
        let dead_letters: Arc<dyn DeadLetterQueue> = match &config.dlq_dir {
            Some(dir) => Arc::new(FileDeadLetter::new(dir.clone()).await?),
            None => Arc::new(InMemoryDeadLetter::new()),
        };

        let pipeline = EventPipeline::new(
            dispatcher,
            AlertEvaluator::new(alert_store, Arc::new(notifier)),
            dead_letters,
        )
        .with_summary(Arc::new(InMemorySummary::new()))
        .with_retry_policy(config.retry_policy())
        .with_concurrency(config.worker_concurrency);

        info!(
            archive = config.archive_dir.is_some(),
            search = config.search_url.is_some(),
            discord = config.discord_webhook_url.is_some(),
            database = config.database_url.is_some(),
            "Event pipeline initialized"
        );

        Ok(Self::new(Arc::new(pipeline), shutdown))
    }
}
