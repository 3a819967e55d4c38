//! Module registry
//!
//! Explicit registration table for module-origin sources. Handlers are
//! registered under a dotted module name; the catalog later builds a module
//! tree from every entry below a configured source name.

use std::collections::BTreeMap;

use super::module::{ModuleKind, ModuleNode};
use super::types::{ActionParams, Handler};
use crate::error::{HandlerError, SourceError};
use crate::handler::RequestContext;

#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, BTreeMap<String, Handler>>,
}

/// Adds functions to one registered module
pub struct ModuleBuilder<'a> {
    module: String,
    functions: &'a mut BTreeMap<String, Handler>,
}

impl ModuleBuilder<'_> {
    /// Register `name` in this module. The handler is named `<module>.<name>`.
    pub fn function<F>(self, name: &str, func: F) -> Self
    where
        F: Fn(&mut RequestContext, &ActionParams) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let handler = Handler::new(format!("{}.{name}", self.module), func);
        self.functions.insert(name.to_string(), handler);
        self
    }

    /// Register an existing handler under `name`
    pub fn handler(self, name: &str, handler: Handler) -> Self {
        self.functions.insert(name.to_string(), handler);
        self
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name` (creating it if needed) and return a builder for its functions
    pub fn module(&mut self, name: &str) -> ModuleBuilder<'_> {
        ModuleBuilder {
            module: name.to_string(),
            functions: self.modules.entry(name.to_string()).or_default(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Look up a handler by qualified name, e.g. `app.actions.math.post_add`
    pub fn handler(&self, qualified: &str) -> Option<&Handler> {
        let (module, function) = qualified.rsplit_once('.')?;
        self.modules.get(module)?.get(function)
    }

    /// Build the tree rooted at `root` from every module registered below it.
    ///
    /// Missing intermediate modules (`a.b` when only `a` and `a.b.c` are
    /// registered) become empty namespace nodes.
    pub fn build_tree(&self, root: &str) -> Result<ModuleNode, SourceError> {
        let functions = self
            .modules
            .get(root)
            .ok_or_else(|| SourceError::ModuleNotFound(root.to_string()))?;

        let mut tree = ModuleNode::new(root, ModuleKind::Package);
        tree.extend_functions(functions.iter().map(|(k, v)| (k.clone(), v.clone())));

        let prefix = format!("{root}.");
        for (name, functions) in self.modules.range(prefix.clone()..) {
            let Some(relative) = name.strip_prefix(&prefix) else {
                break;
            };
            let mut node = &mut tree;
            for segment in relative.split('.').filter(|s| !s.is_empty()) {
                node = node.child_or_insert(segment, ModuleKind::Package);
            }
            node.extend_functions(functions.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("any", |_, _| Ok(()));
        registry
            .module("app.math")
            .function("post_add", |_, _| Ok(()))
            .function("get_version", |_, _| Ok(()));
        registry.module("app.deep.er").function("get", |_, _| Ok(()));
        registry.module("application").function("any", |_, _| Ok(()));
        registry
    }

    #[test]
    fn test_handler_lookup_by_qualified_name() {
        let registry = registry();
        let handler = registry.handler("app.math.post_add").unwrap();
        assert_eq!(handler.name(), "app.math.post_add");
        assert!(registry.handler("app.math.missing").is_none());
        assert!(registry.handler("nodots").is_none());
    }

    #[test]
    fn test_build_tree() {
        let tree = registry().build_tree("app").unwrap();
        assert!(tree.function("any").is_some());

        let math = tree.child("math").unwrap();
        assert!(math.function("post_add").is_some());
        assert!(math.function("get_version").is_some());

        // namespace node in between
        let deep = tree.child("deep").unwrap();
        assert_eq!(deep.function_names().count(), 0);
        assert!(deep.child("er").unwrap().function("get").is_some());

        // sibling with a shared name prefix is not a child
        assert!(tree.child("ication").is_none());
    }

    #[test]
    fn test_build_tree_missing_root() {
        let err = registry().build_tree("nope").unwrap_err();
        assert!(matches!(err, SourceError::ModuleNotFound(name) if name == "nope"));
    }
}
