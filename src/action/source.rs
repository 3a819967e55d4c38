//! Source catalog
//!
//! Loads every configured action source into an `ActionHandle` exactly once
//! per process. Sources that fail to load are dropped for good.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use super::manifest::load_directory;
use super::module::ModuleNode;
use super::registry::ModuleRegistry;
use crate::error::SourceError;

/// Configured place to look for action functions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSource")]
pub enum ActionSource {
    /// Dotted module/package name in the module registry
    Module(String),
    /// Directory of manifests
    Path(PathBuf),
}

/// Accepted config spellings: `"a.b"`, `{ module = .. }`, `{ package = .. }`, `{ path = .. }`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSource {
    Name(String),
    Module { module: String },
    Package { package: String },
    Path { path: PathBuf },
}

impl From<RawSource> for ActionSource {
    fn from(raw: RawSource) -> Self {
        match raw {
            RawSource::Name(name)
            | RawSource::Module { module: name }
            | RawSource::Package { package: name } => Self::Module(name),
            RawSource::Path { path } => Self::Path(path),
        }
    }
}

impl ActionSource {
    pub fn module(name: impl Into<String>) -> Self {
        Self::Module(name.into())
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Catalog key; duplicates of a key are ignored
    pub fn key(&self) -> String {
        match self {
            Self::Module(name) => name.clone(),
            Self::Path(path) => path.display().to_string(),
        }
    }

    pub const fn origin(&self) -> SourceOrigin {
        match self {
            Self::Module(_) => SourceOrigin::Module,
            Self::Path(_) => SourceOrigin::Path,
        }
    }

    fn load(&self, registry: &ModuleRegistry) -> Result<ModuleNode, SourceError> {
        match self {
            Self::Module(name) => registry.build_tree(name),
            Self::Path(path) => {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("actions")
                    .to_string();
                load_directory(path, &name, registry)
            }
        }
    }
}

impl fmt::Display for ActionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(name) => write!(f, "module {name}"),
            Self::Path(path) => write!(f, "path {}", path.display()),
        }
    }
}

/// How nested lookups descend into a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOrigin {
    /// Sub-modules by dotted name
    Module,
    /// Sub-directories, then one file module
    Path,
}

/// Loaded source
#[derive(Debug, Clone)]
pub struct ActionHandle {
    key: String,
    origin: SourceOrigin,
    root: Arc<ModuleNode>,
}

impl ActionHandle {
    pub fn new(key: impl Into<String>, origin: SourceOrigin, root: ModuleNode) -> Self {
        Self {
            key: key.into(),
            origin,
            root: Arc::new(root),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub const fn origin(&self) -> SourceOrigin {
        self.origin
    }

    pub fn root(&self) -> &ModuleNode {
        &self.root
    }
}

/// Ordered, load-once set of action handles
#[derive(Debug)]
pub struct SourceCatalog {
    sources: Vec<ActionSource>,
    registry: Arc<ModuleRegistry>,
    handles: OnceLock<Vec<ActionHandle>>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<ActionSource>, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            sources,
            registry,
            handles: OnceLock::new(),
        }
    }

    pub fn sources(&self) -> &[ActionSource] {
        &self.sources
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn is_loaded(&self) -> bool {
        self.handles.get().is_some()
    }

    /// Load every source on first call; later calls return the same handles.
    ///
    /// Concurrent first callers block until the one loader finishes.
    pub fn load_all(&self) -> &[ActionHandle] {
        self.handles
            .get_or_init(|| load_sources(&self.sources, &self.registry))
    }
}

fn load_sources(sources: &[ActionSource], registry: &ModuleRegistry) -> Vec<ActionHandle> {
    let mut seen = HashSet::new();
    let mut handles = Vec::with_capacity(sources.len());

    for source in sources {
        let key = source.key();
        if !seen.insert(key.clone()) {
            tracing::debug!("Ignoring duplicate action source {source}");
            continue;
        }
        match source.load(registry) {
            Ok(root) => {
                tracing::debug!("Loaded action source {source}");
                handles.push(ActionHandle::new(key, source.origin(), root));
            }
            Err(e) => tracing::warn!("Dropping action source {source}: {e}"),
        }
    }

    handles
}
