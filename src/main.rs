use datapulse_server::config::AppConfig;
use datapulse_server::domain::health::service::init_start_time;
use datapulse_server::shutdown::shutdown_signal;
use datapulse_server::utils::logging::{init_logging, LogSettings};
use datapulse_server::{app, AppState};
use std::net::SocketAddr;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    // 1. 환경변수 로드
    dotenvy::dotenv().ok();

    // 2. 로깅 초기화 (guard는 main이 끝날 때까지 유지)
    let _log_guard = init_logging(&LogSettings::from_env());
    init_start_time();

    // 3. 설정 로드
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return;
        }
    };

    // 4. 파이프라인 구성
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = match AppState::from_config(&config, shutdown_rx).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            return;
        }
    };

    // 5. 서버 실행
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind address");
            return;
        }
    };
    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    tracing::info!("Server stopped");
}
