use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::response::ErrorResponse;
use crate::alert::StoreError;
use crate::pipeline::PipelineError;

/// 애플리케이션 전역 에러 타입
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
    ServiceUnavailable(String),
    ValidationError(String),
    JsonParseFailed(String),
}

impl AppError {
    /// 에러 메시지 반환
    pub fn message(&self) -> String {
        match self {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::InternalError(msg) => msg.clone(),
            AppError::ServiceUnavailable(msg) => msg.clone(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::JsonParseFailed(msg) => format!("잘못된 요청 형식입니다: {}", msg),
        }
    }

    /// 에러 코드 반환
    pub fn error_code(&self) -> String {
        match self {
            AppError::BadRequest(_) => "COMMON400",
            AppError::NotFound(_) => "COMMON404",
            AppError::InternalError(_) => "COMMON500",
            AppError::ServiceUnavailable(_) => "COMMON503",
            AppError::ValidationError(_) => "COMMON400",
            AppError::JsonParseFailed(_) => "COMMON400",
        }
        .to_string()
    }

    /// HTTP 상태 코드 반환
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::JsonParseFailed(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.message();

        // 에러 로깅
        match &self {
            AppError::InternalError(_) | AppError::ServiceUnavailable(_) => {
                error!("Internal Server Error: {}", message);
            }
            _ => {
                error!("Error [{}]: {}", error_code, message);
            }
        }

        let error_response = ErrorResponse::new(error_code, message);

        (status, Json(error_response)).into_response()
    }
}

/// JsonRejection을 AppError로 변환
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::JsonParseFailed(rejection.to_string())
    }
}

/// ValidationErrors를 AppError로 변환
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationError(errors.to_string())
    }
}

/// 파이프라인 에러를 HTTP 에러로 변환
///
/// 검증 실패만 400으로 노출하고, 나머지는 서버 측 처리 실패로 취급합니다.
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => AppError::ValidationError(msg),
            PipelineError::Cancelled => {
                AppError::ServiceUnavailable("서버가 종료 중입니다. 잠시 후 다시 시도해주세요.".into())
            }
            PipelineError::Transient(_) => AppError::ServiceUnavailable(err.to_string()),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::NotFound(format!("알림 정의를 찾을 수 없습니다: {}", id)),
            other if other.is_transient() => AppError::ServiceUnavailable(other.to_string()),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

/// 편의 함수들
impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }

    pub fn validation_error(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }
}
