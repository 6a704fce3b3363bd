//! HTTP 요청 추적 미들웨어
//!
//! 요청마다 request ID를 발급하고 처리 시간과 상태 코드를 메트릭으로 기록합니다.

use axum::{
    body::Body,
    extract::{MatchedPath, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 클라이언트가 보낸 `x-request-id`가 있으면 그대로 사용하고, 없으면 새로 발급합니다.
pub async fn request_tracing(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let metric_path = match request.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_string(),
        None => normalize_path(&path),
    };

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();
        let mut response = next.run(request).await;
        let duration = start.elapsed();
        let status = response.status();

        tracing::info!(
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request completed"
        );
        record_request_metrics(method.as_str(), metric_path, status.as_u16(), duration);

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

fn record_request_metrics(method: &str, path: String, status: u16, duration: Duration) {
    let status_str = status.to_string();

    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.clone(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path,
        "status" => status_str
    )
    .record(duration.as_secs_f64());
}

const WEBHOOK_PREFIX: &str = "/api/v1/ingest/webhook/";

/// 라우트 템플릿을 알 수 없을 때 사용하는 메트릭 경로
///
/// 웹훅 source ID 세그먼트만 `:source_id`로 바꾸고 나머지 경로는 그대로 둡니다.
fn normalize_path(path: &str) -> String {
    match path.strip_prefix(WEBHOOK_PREFIX) {
        Some(rest) if !rest.is_empty() => {
            let tail = rest.split_once('/').map(|(_, tail)| tail);
            match tail {
                Some(tail) => format!("{}:source_id/{}", WEBHOOK_PREFIX, tail),
                None => format!("{}:source_id", WEBHOOK_PREFIX),
            }
        }
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_fixed_routes_distinct() {
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/api/v1/alerts"), "/api/v1/alerts");
        assert_eq!(normalize_path("/api/v1/ingest/event"), "/api/v1/ingest/event");
        assert_eq!(normalize_path("/api/v1/ingest/bulk"), "/api/v1/ingest/bulk");
        assert_eq!(normalize_path("/"), "/");
    }

    #[test]
    fn should_replace_only_webhook_source_id() {
        assert_eq!(
            normalize_path("/api/v1/ingest/webhook/stripe"),
            "/api/v1/ingest/webhook/:source_id"
        );
        assert_eq!(
            normalize_path("/api/v1/ingest/webhook/github/extra"),
            "/api/v1/ingest/webhook/:source_id/extra"
        );
        assert_eq!(
            normalize_path("/api/v1/ingest/webhook/"),
            "/api/v1/ingest/webhook/"
        );
    }
}
