//! In-memory module tree
//!
//! Every action source is turned into one tree of `ModuleNode`s when the
//! catalog loads. Resolution afterwards is a pure lookup against it.

use std::collections::{BTreeMap, HashMap};

use super::types::Handler;

/// What a node was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Registered dotted module (module-origin sources)
    Package,
    /// Filesystem directory, functions from its `mod.toml`
    Directory,
    /// Single manifest file; never has children
    File,
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    name: String,
    kind: ModuleKind,
    functions: HashMap<String, Handler>,
    children: BTreeMap<String, ModuleNode>,
}

impl ModuleNode {
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
            functions: HashMap::new(),
            children: BTreeMap::new(),
        }
    }

    /// Qualified name, used in log lines and handler names
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn function(&self, name: &str) -> Option<&Handler> {
        self.functions.get(name)
    }

    pub fn child(&self, segment: &str) -> Option<&Self> {
        self.children.get(segment)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn insert_function(&mut self, name: impl Into<String>, handler: Handler) {
        self.functions.insert(name.into(), handler);
    }

    pub fn extend_functions(&mut self, functions: impl IntoIterator<Item = (String, Handler)>) {
        self.functions.extend(functions);
    }

    /// Returns false (and keeps the existing child) on a name clash
    pub fn insert_child(&mut self, segment: impl Into<String>, child: Self) -> bool {
        match self.children.entry(segment.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(child);
                true
            }
        }
    }

    /// Child for `segment`, creating an empty node of `kind` if missing
    pub fn child_or_insert(&mut self, segment: &str, kind: ModuleKind) -> &mut Self {
        let name = format!("{}.{segment}", self.name);
        self.children
            .entry(segment.to_string())
            .or_insert_with(|| Self::new(name, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Handler {
        Handler::new(name, |_, _| Ok(()))
    }

    #[test]
    fn test_child_or_insert_names_children() {
        let mut root = ModuleNode::new("app", ModuleKind::Package);
        root.child_or_insert("math", ModuleKind::Package)
            .insert_function("post_add", noop("app.math.post_add"));

        let math = root.child("math").unwrap();
        assert_eq!(math.name(), "app.math");
        assert!(math.function("post_add").is_some());
        assert!(root.function("post_add").is_none());
    }

    #[test]
    fn test_insert_child_keeps_first() {
        let mut root = ModuleNode::new("site", ModuleKind::Directory);
        assert!(root.insert_child("a", ModuleNode::new("site/a", ModuleKind::Directory)));
        assert!(!root.insert_child("a", ModuleNode::new("site/a.toml", ModuleKind::File)));
        assert_eq!(root.child("a").unwrap().kind(), ModuleKind::Directory);
    }
}
