//! HTTP server lifecycle.

use std::net::SocketAddr;

use axum::middleware;
use tokio::signal;
use tracing::info;

use crate::http::{
    middleware::{create_cors_layer, create_trace_layer, request_logger},
    routes::create_router,
    AppState,
};

/// Bind and serve until Ctrl+C, SIGTERM or an in-process shutdown signal.
///
/// No request timeout layer is installed here: streamed queries legitimately
/// run for minutes, and each relay enforces its own per-request deadline.
pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", state.config.http.host, state.config.http.port).parse()?;

    let app = create_router(state.clone())
        .layer(middleware::from_fn(request_logger))
        .layer(create_trace_layer())
        .layer(create_cors_layer());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on http://{addr}");

    let mut shutdown_rx = state.shutdown_tx.subscribe();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("received Ctrl+C");
                }
                _ = shutdown_rx.recv() => {
                    info!("received in-process shutdown signal");
                }
                _ = wait_for_sigterm() => {
                    info!("received SIGTERM");
                }
            }
            info!("starting graceful shutdown");
        })
        .await?;

    info!("server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    // No SIGTERM off unix; Ctrl+C and the in-process signal still work.
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use procrelay_core::config::RelayConfig;
    use std::time::Duration;
    use tokio::sync::broadcast;

    #[tokio::test]
    async fn server_shuts_down_on_broadcast_signal() {
        let mut cfg = RelayConfig::default();
        cfg.http.host = "127.0.0.1".into();
        cfg.http.port = 18080; // off the default port to avoid collisions

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = AppState::new(cfg, shutdown_tx.clone());

        let server_handle = tokio::spawn(async move { start_server(state).await });

        tokio::time::sleep(Duration::from_millis(300)).await;
        let _ = shutdown_tx.send(());

        let result = tokio::time::timeout(Duration::from_secs(5), server_handle).await;
        assert!(result.is_ok(), "server should shut down gracefully");
    }
}
