use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::sink::EventSummary;
use crate::state::AppState;
#[allow(unused_imports)]
use crate::utils::{error::AppError, response::ErrorResponse, BaseResponse};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessSummaryListResponse {
    pub is_success: bool,
    pub code: String,
    pub message: String,
    pub result: Vec<EventSummary>,
}

/// 일간 집계 조회 API
///
/// 이벤트 타입별 일간 처리 건수를 날짜순으로 반환합니다.
#[utoipa::path(
    get,
    path = "/api/v1/summaries",
    responses(
        (status = 200, description = "조회 성공", body = SuccessSummaryListResponse),
        (status = 500, description = "집계 읽기 실패", body = ErrorResponse)
    ),
    tag = "Ingest"
)]
pub async fn list_summaries(
    State(state): State<AppState>,
) -> Result<Json<BaseResponse<Vec<EventSummary>>>, AppError> {
    let rows = match state.summary() {
        Some(summary) => summary
            .list()
            .await
            .map_err(|e| AppError::internal_error(format!("집계를 읽을 수 없습니다: {}", e)))?,
        None => Vec::new(),
    };

    Ok(Json(BaseResponse::success(rows)))
}
