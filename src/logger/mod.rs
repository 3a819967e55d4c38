//! Logger module
//!
//! Diagnostics go through `tracing`, filtered by `RUST_LOG` or
//! `logging.level`, to stderr or `logging.error_log_file`. Access lines are
//! written separately in the configured format.

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use std::net::SocketAddr;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::action::ResolverStats;
use crate::config::Config;
use crate::error::LoggerError;

/// Install the diagnostic subscriber and the access log writer.
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> Result<(), LoggerError> {
    let filter = build_filter(&config.logging.level)?;

    let make_writer = match config.logging.error_log_file.as_deref() {
        Some(path) => {
            let file = writer::open_log_file(path).map_err(|source| LoggerError::Open {
                path: path.to_string(),
                source,
            })?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_ansi(config.logging.error_log_file.is_none())
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;

    let access_path = config.logging.access_log_file.as_deref();
    writer::init(access_path).map_err(|source| LoggerError::Open {
        path: access_path.unwrap_or("<stdout>").to_string(),
        source,
    })
}

/// `RUST_LOG` wins over the configured level
fn build_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|_| LoggerError::Filter(level.to_string())),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, sources_loaded: usize) {
    tracing::info!("Server started, listening on http://{addr}");
    tracing::info!(
        "Action sources: {} configured, {sources_loaded} loaded (fallback {})",
        config.actions.sources.len(),
        if config.actions.fallback { "on" } else { "off" }
    );
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("Access log: {path}");
    }
}

pub fn log_server_stop(stats: &ResolverStats) {
    tracing::info!(
        "Server stopped: {} resolution(s), {} cache hit(s), {} cached action(s)",
        stats.pipeline_runs,
        stats.cache_hits,
        stats.cached_actions
    );
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    writer::write_access(&entry.format(format));
}
