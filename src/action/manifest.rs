//! Manifest loading for path-origin sources
//!
//! A path source is a directory tree. Each `<name>.toml` file is a file
//! module whose top-level tables declare its functions; a directory's own
//! functions live in its `mod.toml`.
//!
//! ```toml
//! [post_add]
//! type = "handler"
//! name = "app.math.post_add"
//!
//! [get_version]
//! type = "direct"
//! status = 200
//! body = "1.0"
//! content_type = "text/plain"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::module::{ModuleKind, ModuleNode};
use super::registry::ModuleRegistry;
use super::types::Handler;
use crate::error::SourceError;

/// File holding a directory's own functions
pub const DIRECTORY_MANIFEST: &str = "mod.toml";

const MANIFEST_EXTENSION: &str = "toml";

/// Declared function of a manifest (or of a configured pre-registered action)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionDef {
    /// Fixed response
    Direct {
        #[serde(default = "default_direct_status")]
        status: u16,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        content_type: Option<String>,
    },
    /// Serve a file from disk
    File {
        path: PathBuf,
        #[serde(default)]
        content_type: Option<String>,
    },
    /// HTTP redirect
    Redirect {
        target: String,
        #[serde(default = "default_redirect_code")]
        code: u16,
    },
    /// Function registered in the module registry
    Handler { name: String },
}

#[allow(clippy::missing_const_for_fn)]
fn default_direct_status() -> u16 {
    200
}

#[allow(clippy::missing_const_for_fn)]
fn default_redirect_code() -> u16 {
    302
}

impl FunctionDef {
    /// Turn the declaration into a callable handler named `name`.
    ///
    /// Returns `None` only for a `handler` reference missing from `registry`.
    pub fn to_handler(&self, name: &str, registry: &ModuleRegistry) -> Option<Handler> {
        let handler = match self.clone() {
            Self::Direct {
                status,
                body,
                content_type,
            } => Handler::new(name, move |ctx, _| {
                ctx.reply(status, None, body.as_deref(), content_type.as_deref())?;
                Ok(())
            }),
            Self::File { path, content_type } => Handler::new(name, move |ctx, _| {
                ctx.send_file(&path, content_type.as_deref())?;
                Ok(())
            }),
            Self::Redirect { target, code } => Handler::new(name, move |ctx, _| {
                ctx.redirect(&target, code)?;
                Ok(())
            }),
            Self::Handler { name: qualified } => registry.handler(&qualified)?.renamed(name),
        };
        Some(handler)
    }
}

/// Parsed manifest: function name -> declaration
pub type Manifest = BTreeMap<String, FunctionDef>;

pub fn parse_manifest(path: &Path) -> Result<Manifest, SourceError> {
    let text = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| SourceError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Load one manifest file as a `File` module
pub fn load_file_module(
    path: &Path,
    name: &str,
    registry: &ModuleRegistry,
) -> Result<ModuleNode, SourceError> {
    let mut node = ModuleNode::new(name, ModuleKind::File);
    node.extend_functions(manifest_functions(path, name, registry)?);
    Ok(node)
}

/// Handlers declared by the manifest at `path`, named `<module>.<function>`
fn manifest_functions(
    path: &Path,
    module: &str,
    registry: &ModuleRegistry,
) -> Result<Vec<(String, Handler)>, SourceError> {
    parse_manifest(path)?
        .into_iter()
        .map(|(function, def)| {
            let handler = def
                .to_handler(&format!("{module}.{function}"), registry)
                .ok_or_else(|| unknown_handler(path, &def))?;
            Ok((function, handler))
        })
        .collect()
}

/// Walk `dir` into a module tree.
///
/// Broken sub-directories and manifests are skipped with a warning so that
/// descent treats them as missing; only a broken root fails the source.
pub fn load_directory(
    dir: &Path,
    name: &str,
    registry: &ModuleRegistry,
) -> Result<ModuleNode, SourceError> {
    if !dir.is_dir() {
        return Err(SourceError::NotADirectory(dir.to_path_buf()));
    }

    let mut node = ModuleNode::new(name, ModuleKind::Directory);
    let own = dir.join(DIRECTORY_MANIFEST);
    if own.is_file() {
        node.extend_functions(manifest_functions(&own, name, registry)?);
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|source| SourceError::Io {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    // directories first so they win name clashes with file modules
    entries.sort_by_key(|p| (!p.is_dir(), p.clone()));

    for path in entries {
        let Some(segment) = module_segment(&path) else {
            continue;
        };
        let child_name = format!("{name}.{segment}");
        let loaded = if path.is_dir() {
            load_directory(&path, &child_name, registry)
        } else {
            load_file_module(&path, &child_name, registry)
        };
        match loaded {
            Ok(child) => {
                if !node.insert_child(segment.clone(), child) {
                    tracing::warn!(
                        "Skipping {}: a sub-directory named {segment:?} takes precedence",
                        path.display()
                    );
                }
            }
            Err(e) => tracing::warn!("Unable to load module {child_name:?}: {e}"),
        }
    }

    Ok(node)
}

/// Segment a directory entry answers to, if it is a module at all
fn module_segment(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') {
        return None;
    }
    if path.is_dir() {
        return Some(file_name.to_string());
    }
    if file_name == DIRECTORY_MANIFEST {
        return None;
    }
    let stem = file_name.strip_suffix(MANIFEST_EXTENSION)?.strip_suffix('.')?;
    (!stem.is_empty()).then(|| stem.to_string())
}

fn unknown_handler(path: &Path, def: &FunctionDef) -> SourceError {
    let name = match def {
        FunctionDef::Handler { name } => name.clone(),
        _ => String::new(),
    };
    SourceError::UnknownHandler {
        path: path.to_path_buf(),
        name,
    }
}
