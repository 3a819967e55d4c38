//! Function and catch-all matching against one module

use super::module::ModuleNode;
use super::types::{Handler, Origin};

/// Generic prefix matching every verb
pub const ANY: &str = "any";

/// Function names tried for `tail`, in priority order.
///
/// `verb_a_b`, `any_a_b`, `a_b`; with an empty tail just `verb`, `any`.
pub fn candidate_names(verb: &str, tail: &[String]) -> Vec<String> {
    let verb = verb.to_ascii_lowercase();
    if tail.is_empty() {
        return vec![verb, ANY.to_string()];
    }
    let joined = tail.join("_");
    vec![format!("{verb}_{joined}"), format!("{ANY}_{joined}"), joined]
}

/// Find a function for `tail` in `module`.
///
/// With `fallback` the tail is shortened from the end until something
/// matches; anything found after shortening has origin `Fallback`.
pub fn match_function<'a>(
    module: &'a ModuleNode,
    tail: &[String],
    verb: &str,
    fallback: bool,
) -> Option<(&'a Handler, Origin)> {
    let mut tail = tail;
    let mut peeled = 0usize;

    loop {
        let found = candidate_names(verb, tail)
            .iter()
            .find_map(|name| module.function(name));
        if let Some(handler) = found {
            let origin = if peeled == 0 {
                Origin::Direct
            } else {
                Origin::Fallback
            };
            return Some((handler, origin));
        }

        if !fallback || tail.is_empty() {
            return None;
        }
        tail = &tail[..tail.len() - 1];
        peeled += 1;
    }
}

/// Function named after the verb, else `any`
pub fn find_catchall<'a>(module: &'a ModuleNode, verb: &str) -> Option<&'a Handler> {
    module
        .function(&verb.to_ascii_lowercase())
        .or_else(|| module.function(ANY))
}
