pub mod alert;
pub mod config;
pub mod domain;
pub mod event;
pub mod pipeline;
pub mod shutdown;
pub mod sink;
pub mod state;
pub mod utils;

pub use state::AppState;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        domain::health::handler::health_check,
        domain::ingest::handler::ingest_event,
        domain::ingest::handler::ingest_webhook,
        domain::ingest::handler::ingest_bulk,
        domain::alert::handler::list_alerts,
        domain::alert::handler::create_alert,
        domain::dead_letter::handler::list_dead_letters,
        domain::summary::handler::list_summaries,
    ),
    components(
        schemas(
            event::RawEvent,
            event::Event,
            sink::SinkKind,
            domain::ingest::dto::IngestStatus,
            domain::ingest::dto::IngestResult,
            domain::ingest::dto::SuccessIngestResponse,
            domain::ingest::dto::BulkIngestRequest,
            domain::ingest::dto::BulkItemResult,
            domain::ingest::dto::BulkIngestResult,
            domain::ingest::dto::SuccessBulkIngestResponse,
            alert::Severity,
            alert::AlertCondition,
            alert::AlertDefinition,
            alert::AlertMatch,
            domain::alert::dto::CreateAlertRequest,
            domain::alert::dto::SuccessAlertResponse,
            domain::alert::dto::SuccessAlertListResponse,
            pipeline::FailedEvent,
            domain::dead_letter::handler::SuccessDeadLetterListResponse,
            sink::EventSummary,
            domain::summary::handler::SuccessSummaryListResponse,
            domain::health::dto::HealthStatus,
            domain::health::dto::HealthState,
            domain::health::dto::HealthChecks,
            domain::health::dto::CheckResult,
            utils::response::ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "서버 상태 API"),
        (name = "Ingest", description = "이벤트 수집 API"),
        (name = "Alert", description = "알림 정의 API")
    )
)]
pub struct ApiDoc;

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(domain::health::handler::health_check))
        .route(
            "/api/v1/ingest/event",
            post(domain::ingest::handler::ingest_event),
        )
        .route(
            "/api/v1/ingest/bulk",
            post(domain::ingest::handler::ingest_bulk),
        )
        .route(
            "/api/v1/ingest/webhook/:source_id",
            post(domain::ingest::handler::ingest_webhook),
        )
        .route(
            "/api/v1/alerts",
            get(domain::alert::handler::list_alerts).post(domain::alert::handler::create_alert),
        )
        .route(
            "/api/v1/dead-letters",
            get(domain::dead_letter::handler::list_dead_letters),
        )
        .route(
            "/api/v1/summaries",
            get(domain::summary::handler::list_summaries),
        )
        .layer(middleware::from_fn(utils::middleware::request_tracing))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
