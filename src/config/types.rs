// Configuration types
// Every section has defaults, so an empty file is a valid configuration

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::action::{ActionSource, FunctionDef};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub actions: ActionsConfig,
}

/// Listener configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Tokio worker threads; the runtime default when unset
    #[serde(default)]
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Diagnostic filter, overridden by `RUST_LOG`
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Diagnostic log file path (stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Connection tuning, in seconds
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    #[serde(default)]
    pub max_connections: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    /// Largest accepted request body in bytes
    pub max_body_size: u64,
}

/// Where actions come from
#[derive(Debug, Deserialize, Clone)]
pub struct ActionsConfig {
    /// Searched in order
    pub sources: Vec<ActionSource>,
    /// Let shorter functions absorb deeper paths
    pub fallback: bool,
    /// Explicit actions by identifier, e.g. `"GET /health"` or `"ANY 404"`
    #[serde(default)]
    pub registered: BTreeMap<String, FunctionDef>,
}
