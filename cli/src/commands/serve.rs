use procrelay_core::config;
use tokio::sync::broadcast;

use crate::commands::cli::ServeArgs;
use crate::http::{server, AppState};

/// Handle the `serve` command: merge configuration (CLI flags win over file
/// and environment), build shared state and run the server until shutdown.
pub async fn handle_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut cfg = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load_default()?,
    };
    if let Some(port) = args.port {
        cfg.http.port = port;
    }
    if let Some(host) = args.host {
        cfg.http.host = host;
    }

    let (shutdown_tx, _) = broadcast::channel(1);
    let state = AppState::new(cfg, shutdown_tx);

    server::start_server(state).await
}
