//! Action cache
//!
//! Process-lifetime map from action identifier to resolved action. Entries
//! are never invalidated or evicted.

use dashmap::DashMap;
use std::sync::Arc;

use super::types::Action;

#[derive(Debug, Default)]
pub struct ActionCache {
    entries: DashMap<String, Arc<Action>>,
}

impl ActionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<Action>> {
        self.entries.get(identifier).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `action` unless the identifier is already cached; returns the cached entry.
    ///
    /// Racing first resolutions compute equal actions, so whichever lands first wins.
    pub fn insert_if_absent(&self, identifier: String, action: Action) -> Arc<Action> {
        Arc::clone(
            self.entries
                .entry(identifier)
                .or_insert_with(|| Arc::new(action))
                .value(),
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Handler, Origin};

    #[test]
    fn test_first_insert_wins() {
        let cache = ActionCache::new();
        let first = Handler::new("a", |_, _| Ok(()));
        let second = Handler::new("b", |_, _| Ok(()));

        let stored = cache.insert_if_absent("GET /x".into(), Action::new(first, Origin::Direct));
        let again = cache.insert_if_absent("GET /x".into(), Action::new(second, Origin::Fallback));

        assert!(Arc::ptr_eq(&stored, &again));
        assert_eq!(again.handler().name(), "a");
        assert_eq!(cache.len(), 1);
        assert!(Arc::ptr_eq(&cache.get("GET /x").unwrap(), &stored));
        assert!(cache.get("GET /y").is_none());
    }
}
