use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::pipeline::FailedEvent;
use crate::state::AppState;
#[allow(unused_imports)]
use crate::utils::{error::AppError, response::ErrorResponse, BaseResponse};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessDeadLetterListResponse {
    pub is_success: bool,
    pub code: String,
    pub message: String,
    pub result: Vec<FailedEvent>,
}

/// DLQ 조회 API
///
/// 재시도를 모두 소진해 처리에 실패한 이벤트를 오래된 순으로 반환합니다.
#[utoipa::path(
    get,
    path = "/api/v1/dead-letters",
    responses(
        (status = 200, description = "조회 성공", body = SuccessDeadLetterListResponse),
        (status = 500, description = "DLQ 읽기 실패", body = ErrorResponse)
    ),
    tag = "Ingest"
)]
pub async fn list_dead_letters(
    State(state): State<AppState>,
) -> Result<Json<BaseResponse<Vec<FailedEvent>>>, AppError> {
    let failed = state
        .dead_letters()
        .list()
        .await
        .map_err(|e| AppError::internal_error(format!("DLQ를 읽을 수 없습니다: {}", e)))?;

    Ok(Json(BaseResponse::success(failed)))
}
