use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde_json::Value;
use validator::Validate;

#[allow(unused_imports)]
use super::dto::{
    BulkIngestRequest, BulkIngestResult, IngestResult, SuccessBulkIngestResponse,
    SuccessIngestResponse,
};
use crate::event::{intake, RawEvent};
use crate::pipeline::ProcessedEvent;
use crate::state::AppState;
use crate::utils::{error::AppError, response::ErrorResponse, BaseResponse};

const SHUTTING_DOWN: &str = "서버가 종료 중입니다. 잠시 후 다시 시도해주세요.";

/// 이벤트 단건 수집 API
///
/// 이벤트를 검증한 뒤 Enrichment, Fan-out, 알림 평가를 거쳐 처리합니다.
#[utoipa::path(
    post,
    path = "/api/v1/ingest/event",
    request_body = RawEvent,
    responses(
        (status = 200, description = "이벤트 처리 성공", body = SuccessIngestResponse),
        (status = 400, description = "잘못된 요청", body = ErrorResponse),
        (status = 500, description = "이벤트 처리 실패 (DLQ 이동)", body = ErrorResponse),
        (status = 503, description = "서버 종료 중", body = ErrorResponse)
    ),
    tag = "Ingest"
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    payload: Result<Json<RawEvent>, JsonRejection>,
) -> Result<Json<BaseResponse<IngestResult>>, AppError> {
    let Json(raw) = payload?;
    let processed = run_single(&state, raw).await?;

    Ok(Json(respond(&processed)))
}

/// 웹훅 수집 API
///
/// 임의의 JSON 객체를 `webhook` 타입 이벤트로 수집합니다.
#[utoipa::path(
    post,
    path = "/api/v1/ingest/webhook/{source_id}",
    params(
        ("source_id" = String, Path, description = "데이터 소스 ID")
    ),
    request_body(content = Object, description = "임의의 JSON 객체"),
    responses(
        (status = 200, description = "이벤트 처리 성공", body = SuccessIngestResponse),
        (status = 400, description = "잘못된 요청", body = ErrorResponse),
        (status = 500, description = "이벤트 처리 실패 (DLQ 이동)", body = ErrorResponse)
    ),
    tag = "Ingest"
)]
pub async fn ingest_webhook(
    State(state): State<AppState>,
    Path(source_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BaseResponse<IngestResult>>, AppError> {
    let Json(body) = payload?;
    let processed = run_single(&state, intake::webhook_submission(&source_id, body)).await?;

    Ok(Json(respond(&processed)))
}

/// 이벤트 대량 수집 API
///
/// 최대 1000개의 이벤트를 동시에 처리합니다. 잘못된 이벤트는 개별적으로 거절됩니다.
#[utoipa::path(
    post,
    path = "/api/v1/ingest/bulk",
    request_body = BulkIngestRequest,
    responses(
        (status = 200, description = "대량 수집 처리 완료", body = SuccessBulkIngestResponse),
        (status = 400, description = "잘못된 요청", body = ErrorResponse),
        (status = 503, description = "서버 종료 중", body = ErrorResponse)
    ),
    tag = "Ingest"
)]
pub async fn ingest_bulk(
    State(state): State<AppState>,
    payload: Result<Json<BulkIngestRequest>, JsonRejection>,
) -> Result<Json<BaseResponse<BulkIngestResult>>, AppError> {
    let Json(req) = payload?;
    req.validate()?;
    reject_if_shutting_down(&state)?;

    // 클라이언트 연결이 끊겨도 싱크 전달이 중간에 끊기지 않도록 별도 태스크에서 실행
    let pipeline = state.pipeline.clone();
    let shutdown = state.shutdown.clone();
    let outcomes = tokio::spawn(async move { pipeline.process_batch(req.events, shutdown).await })
        .await
        .map_err(|e| AppError::internal_error(format!("이벤트 처리 작업이 중단되었습니다: {}", e)))?;

    Ok(Json(BaseResponse::success(BulkIngestResult::from_outcomes(
        &outcomes,
    ))))
}

async fn run_single(state: &AppState, raw: RawEvent) -> Result<ProcessedEvent, AppError> {
    let event = state.pipeline.ingest(raw)?;
    reject_if_shutting_down(state)?;

    let pipeline = state.pipeline.clone();
    let shutdown = state.shutdown.clone();
    let result = tokio::spawn(async move { pipeline.process_event(event, Some(&shutdown)).await })
        .await
        .map_err(|e| AppError::internal_error(format!("이벤트 처리 작업이 중단되었습니다: {}", e)))?;

    Ok(result?)
}

fn reject_if_shutting_down(state: &AppState) -> Result<(), AppError> {
    if *state.shutdown.borrow() {
        return Err(AppError::ServiceUnavailable(SHUTTING_DOWN.into()));
    }
    Ok(())
}

fn respond(processed: &ProcessedEvent) -> BaseResponse<IngestResult> {
    let result = IngestResult::from(processed);
    if processed.is_partial() {
        BaseResponse::accepted(result, "이벤트가 처리되었지만 일부 싱크 전달에 실패했습니다.")
    } else {
        BaseResponse::success(result)
    }
}
