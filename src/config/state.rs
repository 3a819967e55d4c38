// Application state
// Shared by every connection task

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::types::Config;
use crate::action::Resolver;

/// Application state
pub struct AppState {
    /// Configuration as loaded at startup
    pub config: Config,
    /// Action resolver, shared with every request
    pub resolver: Arc<Resolver>,
    /// Read on every request without touching `config`
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: Config, resolver: Arc<Resolver>) -> Self {
        let cached_access_log = AtomicBool::new(config.logging.access_log);
        Self {
            config,
            resolver,
            cached_access_log,
        }
    }

    /// Whether access log lines are written (lock-free)
    pub fn access_log_enabled(&self) -> bool {
        self.cached_access_log.load(Ordering::Relaxed)
    }
}
