//! Actions shipped with the server, searched by default as `action_server.actions`.
//!
//! `/ping` answers every verb through the `any` catch-all of the `ping` module.

use crate::action::{ActionParams, ModuleRegistry};
use crate::config::DEFAULT_SOURCE;
use crate::error::HandlerError;
use crate::handler::RequestContext;

/// Registry holding the bundled modules
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    register(&mut registry);
    registry
}

/// Add the bundled modules to an existing registry
pub fn register(registry: &mut ModuleRegistry) {
    registry.module(DEFAULT_SOURCE);
    registry
        .module(&format!("{DEFAULT_SOURCE}.ping"))
        .function("any", ping);
}

fn ping(ctx: &mut RequestContext, _params: &ActionParams) -> Result<(), HandlerError> {
    ctx.success(Some("Pong"), Some("pong\n"), Some("text/plain"))?;
    Ok(())
}
