use tokio::signal;
use tokio::sync::watch;

/// Graceful shutdown을 위한 시그널 핸들러
///
/// SIGTERM 또는 SIGINT(Ctrl+C) 시그널을 수신하면 `notify`에 `true`를 보내고 반환합니다.
/// 파이프라인은 이 값을 보고 새 이벤트 접수와 싱크 전달 시작을 멈추며,
/// 이미 싱크 전달 단계에 들어간 이벤트는 끝까지 처리됩니다.
pub async fn shutdown_signal(notify: watch::Sender<bool>) {
    wait_for_signal().await;

    tracing::info!("Initiating graceful shutdown...");
    // 수신자가 없어도 종료는 계속 진행
    let _ = notify.send(true);
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
