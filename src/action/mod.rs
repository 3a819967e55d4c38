//! Action resolution engine
//!
//! Turns a verb and URL path into the handler that should process it by
//! searching the configured action sources:
//! - `source`: load-once catalog of module and path sources
//! - `descend`: walk nested modules along the path
//! - `matcher`: verb-prefixed, generic and bare function names, fallback ladder, catch-alls
//! - `resolver`: the orchestrator plus registered and error actions
//! - `cache`: process-lifetime action cache

mod cache;
mod descend;
mod manifest;
mod matcher;
mod module;
mod registry;
mod resolver;
mod source;
mod types;

pub use cache::ActionCache;
pub use descend::descend;
pub use manifest::{load_directory, parse_manifest, FunctionDef, Manifest, DIRECTORY_MANIFEST};
pub use matcher::{candidate_names, find_catchall, match_function, ANY};
pub use module::{ModuleKind, ModuleNode};
pub use registry::{ModuleBuilder, ModuleRegistry};
pub use resolver::{Preflight, Resolver, ResolverConfig, ResolverStats};
pub use source::{ActionHandle, ActionSource, SourceCatalog, SourceOrigin};
pub use types::{
    action_identifier, normalize_identifier, parse_fields, Action, ActionParams, FieldMap,
    FileMap, FileUpload, Handler, HandlerFn, Origin, RequestUrl,
};
