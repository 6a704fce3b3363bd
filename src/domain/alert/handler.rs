use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::info;
use validator::Validate;

#[allow(unused_imports)]
use super::dto::{CreateAlertRequest, SuccessAlertListResponse, SuccessAlertResponse};
use crate::alert::AlertDefinition;
use crate::state::AppState;
use crate::utils::{error::AppError, response::ErrorResponse, BaseResponse};

/// 알림 정의 목록 조회 API
///
/// 비활성 정의를 포함한 전체 목록과 발생 횟수를 반환합니다.
#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    responses(
        (status = 200, description = "조회 성공", body = SuccessAlertListResponse),
        (status = 500, description = "저장소 오류", body = ErrorResponse)
    ),
    tag = "Alert"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
) -> Result<Json<BaseResponse<Vec<AlertDefinition>>>, AppError> {
    let definitions = state.alert_store.list_all().await?;

    Ok(Json(BaseResponse::success(definitions)))
}

/// 알림 정의 생성 API
#[utoipa::path(
    post,
    path = "/api/v1/alerts",
    request_body = CreateAlertRequest,
    responses(
        (status = 200, description = "생성 성공", body = SuccessAlertResponse),
        (status = 400, description = "잘못된 요청", body = ErrorResponse)
    ),
    tag = "Alert"
)]
pub async fn create_alert(
    State(state): State<AppState>,
    payload: Result<Json<CreateAlertRequest>, JsonRejection>,
) -> Result<Json<BaseResponse<AlertDefinition>>, AppError> {
    let Json(req) = payload?;
    req.validate()?;

    let definition = AlertDefinition::from(req);
    state.alert_store.upsert(definition.clone()).await?;

    info!(definition_id = %definition.id, "Alert definition created: {}", definition.name);

    Ok(Json(BaseResponse::success(definition)))
}
