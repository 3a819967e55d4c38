//! Verb and path based action server.
//!
//! A request such as `POST /math/add` is resolved to a handler function by
//! searching the configured action sources (module trees built from a
//! [`action::ModuleRegistry`] or directories of TOML manifests), with optional
//! fallback to broader functions, catch-alls and registered 404 handlers.

pub mod action;
pub mod actions;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;

pub use action::{Action, ActionParams, Handler, ModuleRegistry, Origin, Resolver};
pub use config::{AppState, Config};
pub use error::{ConfigurationError, HandlerError};
pub use handler::RequestContext;
