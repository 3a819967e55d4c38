//! Resolution orchestrator
//!
//! Maps a verb and request target to an `Action`:
//!
//! 1. registered actions and the action cache
//! 2. every source in configured order (descend, then function or catch-all match)
//! 3. global catch-all sweep over the root of every source
//! 4. registered error handlers (`<VERB> 404`, `ANY 404`, `404`)
//!
//! Results of steps 2 and 3 are cached for the life of the process. Error
//! actions are rebuilt per call with the request URL bound.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::cache::ActionCache;
use super::descend::descend;
use super::matcher::{find_catchall, match_function};
use super::registry::ModuleRegistry;
use super::source::{ActionHandle, ActionSource, SourceCatalog};
use super::types::{action_identifier, normalize_identifier, Action, Handler, Origin, RequestUrl};

/// Status code looked up among registered error actions
const NOT_FOUND: &str = "404";

/// Resolver settings
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Searched in order; the first source producing a match wins
    pub sources: Vec<ActionSource>,
    /// Let shorter functions absorb deeper paths
    pub fallback: bool,
}

/// Outcome of a resolution made before the request body is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    /// A real action exists; read the body and dispatch
    Accept,
    /// Only an error handler or nothing at all; answer 404 without reading the body
    Reject,
}

/// Counters since startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolverStats {
    pub cache_hits: u64,
    pub pipeline_runs: u64,
    pub cached_actions: usize,
}

#[derive(Debug)]
pub struct Resolver {
    catalog: SourceCatalog,
    fallback: bool,
    registered: DashMap<String, Arc<Action>>,
    cache: ActionCache,
    cache_hits: AtomicU64,
    pipeline_runs: AtomicU64,
}

impl Resolver {
    pub fn new(config: ResolverConfig, modules: ModuleRegistry) -> Self {
        Self {
            catalog: SourceCatalog::new(config.sources, Arc::new(modules)),
            fallback: config.fallback,
            registered: DashMap::new(),
            cache: ActionCache::new(),
            cache_hits: AtomicU64::new(0),
            pipeline_runs: AtomicU64::new(0),
        }
    }

    /// Load all sources now instead of on the first request. Returns the number loaded.
    pub fn preload(&self) -> usize {
        self.catalog.load_all().len()
    }

    pub const fn fallback_enabled(&self) -> bool {
        self.fallback
    }

    pub fn modules(&self) -> &ModuleRegistry {
        self.catalog.registry()
    }

    /// Register `handler` for `verb url` with origin `direct`
    pub fn add_action(&self, verb: &str, url: &str, handler: Handler) {
        self.registered.insert(
            action_identifier(verb, url),
            Arc::new(Action::new(handler, Origin::Direct)),
        );
    }

    /// Register under a raw identifier, e.g. `GET /ping`, `ANY 404` or `404`
    pub fn register(&self, identifier: &str, handler: Handler) {
        self.registered.insert(
            normalize_identifier(identifier),
            Arc::new(Action::new(handler, Origin::Direct)),
        );
    }

    /// Drop a registration. Resolved (cached) actions are unaffected.
    pub fn remove_action(&self, verb: &str, url: &str) -> bool {
        self.registered.remove(&action_identifier(verb, url)).is_some()
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            pipeline_runs: self.pipeline_runs.load(Ordering::Relaxed),
            cached_actions: self.cache.len(),
        }
    }

    /// Resolve `verb target` to an action; `None` is a plain miss.
    ///
    /// `target` is split on its first `?`. Callers holding a decoded path
    /// whose text may contain `?` use [`Resolver::resolve_url`] instead.
    pub fn resolve(&self, verb: &str, target: &str) -> Option<Arc<Action>> {
        self.resolve_url(verb, RequestUrl::parse(target))
    }

    /// Resolve `verb` against an already split URL
    pub fn resolve_url(&self, verb: &str, url: RequestUrl) -> Option<Arc<Action>> {
        let identifier = action_identifier(verb, &url.path);

        if let Some(action) = self.lookup(&identifier) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(action);
        }
        self.pipeline_runs.fetch_add(1, Ordering::Relaxed);

        let handles = self.catalog.load_all();

        if let Some((handler, origin)) = self.resolve_in_sources(handles, verb, &url) {
            return Some(self.save(identifier, handler, origin, url));
        }

        if let Some(handler) = handles.iter().find_map(|h| find_catchall(h.root(), verb)) {
            return Some(self.save(identifier, handler, Origin::Catchall, url));
        }

        self.error_action(verb, url)
    }

    /// Resolve ahead of reading a request body
    pub fn preflight(&self, verb: &str, url: &RequestUrl) -> Preflight {
        match self.resolve_url(verb, url.clone()) {
            Some(action) if action.origin() != Origin::Error => Preflight::Accept,
            _ => Preflight::Reject,
        }
    }

    fn lookup(&self, identifier: &str) -> Option<Arc<Action>> {
        self.registered
            .get(identifier)
            .map(|entry| Arc::clone(entry.value()))
            .or_else(|| self.cache.get(identifier))
    }

    fn resolve_in_sources<'a>(
        &self,
        handles: &'a [ActionHandle],
        verb: &str,
        url: &RequestUrl,
    ) -> Option<(&'a Handler, Origin)> {
        let segments = url.segments();
        handles.iter().find_map(|handle| {
            let (module, tail) = descend(handle, &segments);
            if tail.is_empty() {
                // the path named this module itself
                find_catchall(module, verb).map(|h| (h, Origin::Direct))
            } else {
                match_function(module, &tail, verb, self.fallback)
            }
        })
    }

    fn save(&self, identifier: String, handler: &Handler, origin: Origin, url: RequestUrl) -> Arc<Action> {
        tracing::debug!(
            "Action \"{identifier}\" was mapped to \"{}\" [{origin}]",
            handler.name()
        );
        let mut action = Action::new(handler.clone(), origin);
        if origin == Origin::Fallback {
            action = action.with_url(url);
        }
        self.cache.insert_if_absent(identifier, action)
    }

    fn error_action(&self, verb: &str, url: RequestUrl) -> Option<Arc<Action>> {
        let candidates = [
            action_identifier(verb, NOT_FOUND),
            action_identifier("ANY", NOT_FOUND),
            NOT_FOUND.to_string(),
        ];
        let registered = candidates
            .iter()
            .find_map(|name| self.registered.get(name).map(|e| e.handler().clone()))?;
        Some(Arc::new(Action::new(registered, Origin::Error).with_url(url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionParams;
    use crate::handler::RequestContext;
    use std::sync::Mutex;

    fn noop() -> impl Fn(&mut RequestContext, &ActionParams) -> Result<(), crate::error::HandlerError> + Send + Sync + 'static {
        |_, _| Ok(())
    }

    fn resolver(registry: ModuleRegistry, fallback: bool) -> Resolver {
        Resolver::new(
            ResolverConfig {
                sources: vec![ActionSource::module("app")],
                fallback,
            },
            registry,
        )
    }

    fn name_of(action: &Option<Arc<Action>>) -> Option<(&str, Origin)> {
        action.as_ref().map(|a| (a.handler().name(), a.origin()))
    }

    #[test]
    fn test_cache_returns_identical_action() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("get_x", noop());
        let resolver = resolver(registry, false);

        let first = resolver.resolve("GET", "/x").unwrap();
        let second = resolver.resolve("get", "/x?ignored=1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = resolver.stats();
        assert_eq!(stats.pipeline_runs, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cached_actions, 1);
    }

    #[test]
    fn test_resolution_is_independent_of_history() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("a_b", noop()).function("any", noop());
        registry.module("app.a").function("get", noop());

        let fresh = resolver(registry.clone(), true);
        let warmed = resolver(registry, true);
        for path in ["/a", "/zzz", "/a/c/d", "/"] {
            let _ = warmed.resolve("GET", path);
        }

        assert_eq!(
            name_of(&fresh.resolve("GET", "/a/b")),
            name_of(&warmed.resolve("GET", "/a/b"))
        );
        // descent into `app.a` happens before `app.a_b` is ever considered
        assert_eq!(name_of(&fresh.resolve("GET", "/a/b")), Some(("app.a.get", Origin::Fallback)));
    }

    #[test]
    fn test_prefix_priority() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("any_a_b", noop()).function("get_a_b", noop());
        let resolver = resolver(registry, false);
        assert_eq!(name_of(&resolver.resolve("GET", "/a/b")), Some(("app.get_a_b", Origin::Direct)));
    }

    #[test]
    fn test_fallback_enabled() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("a", noop());
        let resolver = resolver(registry, true);

        let action = resolver.resolve("GET", "/a/b").unwrap();
        assert_eq!(action.handler().name(), "app.a");
        assert_eq!(action.origin(), Origin::Fallback);
        assert_eq!(action.bound_url().unwrap().path, "/a/b");
    }

    #[test]
    fn test_fallback_disabled_misses() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("a", noop());
        let resolver = resolver(registry, false);
        assert!(resolver.resolve("GET", "/a/b").is_none());
    }

    #[test]
    fn test_error_precedence() {
        let resolver = resolver(ModuleRegistry::new(), false);
        resolver.register("ANY 404", Handler::new("any_404", noop()));
        resolver.register("get 404", Handler::new("get_404", noop()));
        resolver.register("404", Handler::new("plain_404", noop()));

        let action = resolver.resolve("GET", "/nowhere").unwrap();
        assert_eq!(action.handler().name(), "get_404");
        assert_eq!(action.origin(), Origin::Error);
        assert_eq!(action.bound_url().unwrap().path, "/nowhere");

        let action = resolver.resolve("POST", "/nowhere").unwrap();
        assert_eq!(action.handler().name(), "any_404");
    }

    #[test]
    fn test_error_actions_are_not_cached() {
        let resolver = resolver(ModuleRegistry::new(), false);
        resolver.register("404", Handler::new("plain_404", noop()));

        let first = resolver.resolve("GET", "/gone").unwrap();
        let second = resolver.resolve("GET", "/gone").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.stats().cached_actions, 0);
        assert_eq!(resolver.stats().pipeline_runs, 2);
    }

    #[test]
    fn test_catchall_root_is_direct() {
        let mut registry = ModuleRegistry::new();
        registry.module("app");
        registry.module("app.ping").function("any", noop());
        let resolver = resolver(registry, false);

        let action = resolver.resolve("GET", "/ping").unwrap();
        assert_eq!(action.handler().name(), "app.ping.any");
        assert_eq!(action.origin(), Origin::Direct);
        assert!(action.bound_url().is_none());
    }

    #[test]
    fn test_global_catchall_sweep() {
        let mut first = ModuleRegistry::new();
        first.module("one").function("get_only", noop());
        first.module("two").function("post", noop()).function("any", noop());
        let resolver = Resolver::new(
            ResolverConfig {
                sources: vec![ActionSource::module("one"), ActionSource::module("two")],
                fallback: false,
            },
            first,
        );

        let action = resolver.resolve("GET", "/x/y").unwrap();
        assert_eq!(action.handler().name(), "two.any");
        assert_eq!(action.origin(), Origin::Catchall);

        let action = resolver.resolve("POST", "/x/y").unwrap();
        assert_eq!(action.handler().name(), "two.post");
    }

    #[test]
    fn test_first_source_wins() {
        let mut registry = ModuleRegistry::new();
        registry.module("one").function("get_x", noop());
        registry.module("two").function("get_x", noop());
        let resolver = Resolver::new(
            ResolverConfig {
                sources: vec![ActionSource::module("two"), ActionSource::module("one")],
                fallback: false,
            },
            registry,
        );
        assert_eq!(name_of(&resolver.resolve("GET", "/x")), Some(("two.get_x", Origin::Direct)));
    }

    #[test]
    fn test_nested_function_match() {
        let mut registry = ModuleRegistry::new();
        registry.module("app");
        registry.module("app.math").function("post_add", noop());
        let resolver = resolver(registry, false);

        let action = resolver.resolve("POST", "/math/add").unwrap();
        assert_eq!(action.handler().name(), "app.math.post_add");
        assert_eq!(action.origin(), Origin::Direct);
        assert!(resolver.resolve("GET", "/math/add").is_none());
    }

    #[test]
    fn test_total_miss_invokes_nothing() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("get_somewhere", move |_, _| {
            *counter.lock().unwrap() += 1;
            Ok(())
        });
        let resolver = resolver(registry, false);

        assert!(resolver.resolve("GET", "/nowhere").is_none());
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_registered_actions_come_first() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("get_ping", noop());
        let resolver = resolver(registry, false);
        resolver.add_action("get", "/ping", Handler::new("explicit", noop()));

        assert_eq!(name_of(&resolver.resolve("GET", "/ping")), Some(("explicit", Origin::Direct)));

        assert!(resolver.remove_action("GET", "/ping"));
        assert!(!resolver.remove_action("GET", "/ping"));
        assert_eq!(name_of(&resolver.resolve("GET", "/ping")), Some(("app.get_ping", Origin::Direct)));
    }

    #[test]
    fn test_path_source_resolution() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("site");
        let write = |relative: &str, content: &str| {
            let path = root.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        };
        write("mod.toml", "[get_broken]\ntype = \"direct\"\nbody = \"root\"\n");
        write("api/users.toml", "[get_list]\ntype = \"direct\"\nbody = \"users\"\n");
        write("docs/mod.toml", "[any]\ntype = \"direct\"\nbody = \"docs\"\n");
        write("broken.toml", "[get_broken\ntype = ");

        let resolver = Resolver::new(
            ResolverConfig {
                sources: vec![ActionSource::path(&root)],
                fallback: false,
            },
            ModuleRegistry::new(),
        );
        assert_eq!(resolver.preload(), 1);

        let body = |verb: &str, target: &str| {
            let action = resolver.resolve(verb, target)?;
            let mut ctx = RequestContext::new(verb, target);
            action
                .invoke(&mut ctx, ActionParams::new(RequestUrl::parse(target)))
                .unwrap();
            Some((action.handler().name().to_string(), ctx.pending().body_text()?.to_string()))
        };

        assert_eq!(
            body("GET", "/api/users/list"),
            Some(("site.api.users.get_list".into(), "users".into()))
        );
        assert_eq!(body("PUT", "/docs"), Some(("site.docs.any".into(), "docs".into())));
        // broken.toml is skipped, so the segment falls through to the root manifest
        assert_eq!(body("GET", "/broken"), Some(("site.get_broken".into(), "root".into())));
        assert_eq!(body("POST", "/api/users/list"), None);
    }

    #[test]
    fn test_preflight() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("post_upload", noop());
        let resolver = resolver(registry, false);

        assert_eq!(resolver.preflight("POST", &RequestUrl::parse("/upload")), Preflight::Accept);
        assert_eq!(resolver.preflight("POST", &RequestUrl::parse("/elsewhere")), Preflight::Reject);

        resolver.register("ANY 404", Handler::new("not_found", noop()));
        assert_eq!(resolver.preflight("POST", &RequestUrl::parse("/elsewhere")), Preflight::Reject);
    }

    #[test]
    fn test_concurrent_resolution_agrees() {
        let mut registry = ModuleRegistry::new();
        registry.module("app").function("get_x", noop());
        let resolver = Arc::new(resolver(registry, false));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                std::thread::spawn(move || resolver.resolve("GET", "/x").unwrap())
            })
            .collect();
        let actions: Vec<Arc<Action>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        let cached = resolver.resolve("GET", "/x").unwrap();
        assert!(actions.iter().all(|a| Arc::ptr_eq(a, &cached)));
    }
}
