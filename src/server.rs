use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::AppError;
use crate::metrics::Metrics;
use crate::router::create_router;
use crate::storage::Store;
use crate::AppState;

/// 启动 HTTP 服务，收到退出信号后优雅关闭
///
/// 超过 `shutdown_timeout` 仍未关闭时强制以状态码 1 退出。
pub async fn serve(config: &Config, store: Arc<dyn Store>) -> Result<(), AppError> {
    let state = AppState::new();
    let pinger = spawn_pinger(store, state.metrics.clone(), config.ping_interval());
    let app = create_router(state);

    let addr = SocketAddr::new(config.server_host, config.server_port);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    let grace = config.shutdown_timeout();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let signal = shutdown_signal().await;
            tracing::info!(signal, ?grace, "Received system signal, initiating graceful shutdown");

            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                tracing::error!("Shutdown timed out, forcing exit");
                std::process::exit(1);
            });
        })
        .await;

    pinger.abort();

    match &result {
        Ok(()) => tracing::info!("Server shutdown completed successfully"),
        Err(err) => tracing::error!(error = %err, "HTTP server stopped with error"),
    }
    Ok(result?)
}

/// 定期探活存储；失败只记录，不影响健康检查
pub fn spawn_pinger(store: Arc<dyn Store>, metrics: Arc<Metrics>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        // 启动时已经 PING 过
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.ping().await {
                Ok(latency) => {
                    tracing::debug!(?latency, "Store ping succeeded");
                    metrics.record_ping(Some(latency));
                }
                Err(err) => {
                    tracing::error!(error = %err, "Failed to ping store");
                    metrics.record_ping(None);
                }
            }
        }
    })
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let kinds = [
        (SignalKind::hangup(), "SIGHUP"),
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
        (SignalKind::quit(), "SIGQUIT"),
    ];

    let mut waits = Vec::new();
    for (kind, name) in kinds {
        match signal(kind) {
            Ok(mut stream) => waits.push(Box::pin(async move {
                stream.recv().await;
                name
            })),
            Err(err) => tracing::error!(signal = name, error = %err, "Failed to install signal handler"),
        }
    }

    if waits.is_empty() {
        return std::future::pending().await;
    }

    let (name, _, _) = futures_util::future::select_all(waits).await;
    name
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    "ctrl-c"
}
