// Configuration module entry point
// Loads layered configuration and wires it into the resolver

mod state;
mod types;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::action::{FunctionDef, ModuleRegistry, Resolver, ResolverConfig};

pub use state::AppState;
pub use types::{ActionsConfig, Config, HttpConfig, LoggingConfig, PerformanceConfig, ServerConfig};

/// Module searched when no sources are configured
pub const DEFAULT_SOURCE: &str = "action_server.actions";

const ENV_PREFIX: &str = "ACTION_SERVER";

impl Config {
    /// Load layered configuration.
    ///
    /// Layers, later ones winning:
    /// 1. Built-in defaults for every key
    /// 2. The file at `config_path` (extension optional, any format config-rs reads)
    /// 3. Environment variables such as `ACTION_SERVER_SERVER__PORT=9000`
    ///
    /// A missing file is not an error. When the file is TOML, the keys of
    /// `[actions.registered]` are re-read from it so identifier paths keep
    /// their case.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Path to the config file, with or without extension
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a layer cannot be parsed or a value has the wrong type.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "SimpleActionHTTP/0.1")?
            .set_default("http.max_body_size", 10_485_760)? // 10MB
            .set_default("actions.sources", vec![DEFAULT_SOURCE])?
            .set_default("actions.fallback", false)?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Self = settings.try_deserialize()?;
        if let Some(path) = find_toml_file(config_path) {
            config.actions.restore_identifier_case(&path)?;
        }
        Ok(config)
    }

    /// Listen address built from `server.host` and `server.port`
    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            sources: self.actions.sources.clone(),
            fallback: self.actions.fallback,
        }
    }

    /// Build the resolver over `modules` and register the configured actions.
    ///
    /// Sources are not loaded here; call `Resolver::preload` or let the
    /// first request load them.
    ///
    /// # Arguments
    ///
    /// * `modules` - Handler registry backing module sources and `handler` entries
    pub fn build_resolver(&self, modules: ModuleRegistry) -> Resolver {
        let resolver = Resolver::new(self.resolver_config(), modules);
        let count = self.actions.register_into(&resolver);
        if count > 0 {
            tracing::info!("Registered {count} configured action(s)");
        }
        resolver
    }
}

impl ActionsConfig {
    /// Re-read `[actions.registered]` keys from the TOML file at `path`.
    ///
    /// config-rs lowercases every key it loads, but an identifier's path is
    /// case-sensitive. Entries only present in the environment keep their
    /// lowercased keys.
    fn restore_identifier_case(&mut self, path: &Path) -> Result<(), config::ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|e| config::ConfigError::Message(format!("{}: {e}", path.display())))?;
        let file: RegisteredFile = toml::from_str(&text)
            .map_err(|e| config::ConfigError::Message(format!("{}: {e}", path.display())))?;

        for (identifier, def) in file.actions.registered {
            self.registered.remove(&identifier.to_lowercase());
            self.registered.insert(identifier, def);
        }
        Ok(())
    }

    /// Register every `[actions.registered]` entry; returns how many were accepted.
    ///
    /// Entries naming an unknown handler are skipped with a warning.
    pub fn register_into(&self, resolver: &Resolver) -> usize {
        let mut count = 0;
        for (identifier, def) in &self.registered {
            let name = format!("config[{identifier}]");
            match def.to_handler(&name, resolver.modules()) {
                Some(handler) => {
                    resolver.register(identifier, handler);
                    count += 1;
                }
                None => tracing::warn!("Skipping action \"{identifier}\": unknown handler"),
            }
        }
        count
    }
}

/// The part of a TOML config file whose keys must keep their case
#[derive(Debug, Default, Deserialize)]
struct RegisteredFile {
    #[serde(default)]
    actions: RegisteredTable,
}

#[derive(Debug, Default, Deserialize)]
struct RegisteredTable {
    #[serde(default)]
    registered: BTreeMap<String, FunctionDef>,
}

/// The TOML file config-rs would pick for `config_path`, if any
fn find_toml_file(config_path: &str) -> Option<PathBuf> {
    let given = Path::new(config_path);
    if given.is_file() {
        let is_toml = given
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        return is_toml.then(|| given.to_path_buf());
    }
    let with_ext = PathBuf::from(format!("{config_path}.toml"));
    with_ext.is_file().then_some(with_ext)
}
