//! Path descender
//!
//! Consumes as many leading path segments as name nested modules of a
//! source and hands back the deepest module plus the unconsumed tail.

use super::module::{ModuleKind, ModuleNode};
use super::source::{ActionHandle, SourceOrigin};

/// Deepest module reachable from `handle` along `segments`, and the leftover segments
pub fn descend<'a>(handle: &'a ActionHandle, segments: &[String]) -> (&'a ModuleNode, Vec<String>) {
    let root = handle.root();
    let consumed = match handle.origin() {
        SourceOrigin::Module => descend_modules(root, segments),
        SourceOrigin::Path => descend_directories(root, segments),
    };
    (consumed.0, segments[consumed.1..].to_vec())
}

/// Follow sub-modules until a segment does not resolve
fn descend_modules<'a>(root: &'a ModuleNode, segments: &[String]) -> (&'a ModuleNode, usize) {
    let mut current = root;
    let mut depth = 0;
    for segment in segments {
        match current.child(segment) {
            Some(child) => current = child,
            None => break,
        }
        depth += 1;
    }
    (current, depth)
}

/// Follow sub-directories, then at most one file module
fn descend_directories<'a>(root: &'a ModuleNode, segments: &[String]) -> (&'a ModuleNode, usize) {
    let mut current = root;
    let mut depth = 0;

    while let Some(dir) = segments
        .get(depth)
        .and_then(|s| current.child(s))
        .filter(|c| c.kind() == ModuleKind::Directory)
    {
        current = dir;
        depth += 1;
    }

    if let Some(file) = segments
        .get(depth)
        .and_then(|s| current.child(s))
        .filter(|c| c.kind() == ModuleKind::File)
    {
        current = file;
        depth += 1;
    }

    (current, depth)
}
