use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use procrelay_core::RelayConfig;
use tokio::sync::broadcast;

/// Shared per-server state. Everything request handlers touch is either
/// immutable (`config`) or behind its own lock (`stats`); request tasks own
/// their child processes exclusively, so no relay state lives here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub stats: Arc<RwLock<ServerStats>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(config: RelayConfig, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            config: Arc::new(config),
            stats: Arc::new(RwLock::new(ServerStats::new())),
            shutdown_tx,
        }
    }
}

/// Request counters, logged but not exported anywhere.
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    pub requests_total: u64,
    pub errors_total: u64,
    by_route: HashMap<String, u64>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: 0,
            errors_total: 0,
            by_route: HashMap::new(),
        }
    }

    pub fn increment_request(&mut self, route: &str) {
        self.requests_total += 1;
        *self.by_route.entry(route.to_string()).or_insert(0) += 1;
    }

    pub fn increment_error(&mut self) {
        self.errors_total += 1;
    }

    pub fn route_count(&self, route: &str) -> u64 {
        self.by_route.get(route).copied().unwrap_or(0)
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}
