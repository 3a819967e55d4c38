//! Error types shared across the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Defects in handler code, as opposed to routing misses.
///
/// These are returned straight to the handler and must never be swallowed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("cannot determine mime type from raw content, please specify a content type")]
    MissingContentType,

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid reason phrase: {0:?}")]
    InvalidReasonPhrase(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Failure raised by a handler while processing a request.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Reasons an action source (or one of its file modules) could not be loaded.
///
/// Never surfaced to request handling: the source is dropped and the reason logged.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("module {0:?} is not registered")]
    ModuleNotFound(String),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("manifest {} references unknown handler {name:?}", path.display())]
    UnknownHandler { path: PathBuf, name: String },
}

/// Logger initialization failures.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("failed to open log file {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid log filter {0:?}")]
    Filter(String),

    #[error("logger already initialized")]
    AlreadyInitialized,
}
