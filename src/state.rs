use std::sync::Arc;

use crate::app_logger::{shared_log_buffer, RingSink, SharedLogBuffer};
use crate::config::UpdaterConfig;
use crate::updater::Updater;

/// Shared state behind the HTTP server.
pub struct AppState {
    pub updater: Updater,
    /// Recent orchestrator log lines, served by `GET /logs`.
    pub log_buffer: SharedLogBuffer,
    /// Held for the duration of every update endpoint. Two passes running
    /// `pnpm update` or `git pull` in the same tree would race each other.
    pub update_lock: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Real runner and registry, logging into a fresh ring buffer.
    pub fn new(config: UpdaterConfig) -> Arc<Self> {
        let log_buffer = shared_log_buffer();
        let updater = Updater::from_config(config)
            .with_logger(Arc::new(RingSink::new(log_buffer.clone())));
        Self::with_updater(updater, log_buffer)
    }

    pub fn with_updater(updater: Updater, log_buffer: SharedLogBuffer) -> Arc<Self> {
        Arc::new(Self {
            updater,
            log_buffer,
            update_lock: tokio::sync::Mutex::new(()),
        })
    }
}
