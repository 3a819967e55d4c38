//! Core action types
//!
//! Defines the resolved `Action`, its origin tag, the handler reference and
//! the parameter set delivered to handlers.

use hyper::body::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::HandlerError;
use crate::handler::RequestContext;

/// Field name -> ordered values (query strings and form bodies)
pub type FieldMap = HashMap<String, Vec<String>>;

/// Field name -> ordered uploaded files
pub type FileMap = HashMap<String, Vec<FileUpload>>;

/// Signature every action handler implements
pub type HandlerFn = dyn Fn(&mut RequestContext, &ActionParams) -> Result<(), HandlerError> + Send + Sync;

/// How an action was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Exact function (or the catch-all of a fully descended module)
    Direct,
    /// A broader function absorbed trailing path segments
    Fallback,
    /// Found by the global catch-all sweep over every source
    Catchall,
    /// A registered 404 handler
    Error,
}

impl Origin {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Fallback => "fallback",
            Self::Catchall => "catchall",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named reference to a handler function
#[derive(Clone)]
pub struct Handler {
    name: Arc<str>,
    func: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut RequestContext, &ActionParams) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            func: Arc::new(func),
        }
    }

    /// Fully qualified name, e.g. `app.actions.math.post_add`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same function body under another name
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            func: Arc::clone(&self.func),
        }
    }

    pub fn call(&self, ctx: &mut RequestContext, params: &ActionParams) -> Result<(), HandlerError> {
        (self.func)(ctx, params)
    }

    /// Whether both references point at the same function body
    pub fn same_function(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.name).finish()
    }
}

/// Parsed request target: path plus optional raw query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    pub path: String,
    pub query: Option<String>,
}

impl RequestUrl {
    /// Split a request target on the first `?`. An empty query is treated as absent.
    pub fn parse(target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        Self {
            path: path.to_string(),
            query: query.filter(|q| !q.is_empty()).map(ToString::to_string),
        }
    }

    /// Non-empty path segments
    pub fn segments(&self) -> Vec<String> {
        self.path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Parsed query string; blank values are dropped
    pub fn query_params(&self) -> Option<FieldMap> {
        self.query.as_deref().map(parse_fields)
    }
}

impl fmt::Display for RequestUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.query {
            Some(q) => write!(f, "{}?{q}", self.path),
            None => f.write_str(&self.path),
        }
    }
}

/// Parse `a=1&a=2&b=` style fields, keeping value order and dropping blanks
pub fn parse_fields(input: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    for (name, value) in url::form_urlencoded::parse(input.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        fields
            .entry(name.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    fields
}

/// One uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Fixed parameter set passed to every handler
#[derive(Debug, Clone)]
pub struct ActionParams {
    pub url: RequestUrl,
    pub query: Option<FieldMap>,
    pub form: Option<FieldMap>,
    pub files: Option<FileMap>,
    /// URL the action was first resolved for (fallback and error actions)
    pub original_url: Option<RequestUrl>,
}

impl ActionParams {
    /// `url` is always set; `query` only when the query string is non-empty
    pub fn new(url: RequestUrl) -> Self {
        let query = url.query_params();
        Self {
            url,
            query,
            form: None,
            files: None,
            original_url: None,
        }
    }

    #[must_use]
    pub fn with_form(mut self, form: Option<FieldMap>) -> Self {
        self.form = form.filter(|f| !f.is_empty());
        self
    }

    #[must_use]
    pub fn with_files(mut self, files: Option<FileMap>) -> Self {
        self.files = files.filter(|f| !f.is_empty());
        self
    }

    pub fn path(&self) -> &str {
        &self.url.path
    }

    /// First value of a form field
    pub fn form_value(&self, name: &str) -> Option<&str> {
        first_value(self.form.as_ref(), name)
    }

    /// First value of a query parameter
    pub fn query_value(&self, name: &str) -> Option<&str> {
        first_value(self.query.as_ref(), name)
    }
}

fn first_value<'a>(fields: Option<&'a FieldMap>, name: &str) -> Option<&'a str> {
    fields?.get(name)?.first().map(String::as_str)
}

/// A resolved unit of work. Immutable once created.
#[derive(Debug, Clone)]
pub struct Action {
    handler: Handler,
    origin: Origin,
    bound_url: Option<RequestUrl>,
}

impl Action {
    pub const fn new(handler: Handler, origin: Origin) -> Self {
        Self {
            handler,
            origin,
            bound_url: None,
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: RequestUrl) -> Self {
        self.bound_url = Some(url);
        self
    }

    pub const fn handler(&self) -> &Handler {
        &self.handler
    }

    pub const fn origin(&self) -> Origin {
        self.origin
    }

    pub const fn bound_url(&self) -> Option<&RequestUrl> {
        self.bound_url.as_ref()
    }

    /// Call the handler, merging the bound context into `params`
    pub fn invoke(
        &self,
        ctx: &mut RequestContext,
        mut params: ActionParams,
    ) -> Result<(), HandlerError> {
        if let Some(url) = &self.bound_url {
            params.original_url = Some(url.clone());
        }
        self.handler.call(ctx, &params)
    }
}

/// Cache/registration key: upper-cased verb, a space, the path
pub fn action_identifier(verb: &str, path: &str) -> String {
    format!("{} {path}", verb.to_ascii_uppercase())
}

/// Normalize a configured identifier such as `get /ping` or `404`
pub fn normalize_identifier(raw: &str) -> String {
    let raw = raw.trim();
    match raw.split_once(' ') {
        Some((verb, rest)) => action_identifier(verb, rest.trim_start()),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_identifier_uppercases_verb() {
        assert_eq!(action_identifier("get", "/ping"), "GET /ping");
        assert_eq!(action_identifier("Post", "/a/b"), "POST /a/b");
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("get 404"), "GET 404");
        assert_eq!(normalize_identifier("any  /x"), "ANY /x");
        assert_eq!(normalize_identifier("404"), "404");
    }

    #[test]
    fn test_request_url_parse() {
        let url = RequestUrl::parse("/math/add?x=1&y=2");
        assert_eq!(url.path, "/math/add");
        assert_eq!(url.query.as_deref(), Some("x=1&y=2"));
        assert_eq!(url.segments(), vec!["math", "add"]);

        let url = RequestUrl::parse("/ping?");
        assert_eq!(url.query, None);

        let url = RequestUrl::parse("//a///b/");
        assert_eq!(url.segments(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_fields_keeps_order_and_drops_blanks() {
        let fields = parse_fields("a=1&b=&a=2&c=hello%20world");
        assert_eq!(fields["a"], vec!["1", "2"]);
        assert!(!fields.contains_key("b"));
        assert_eq!(fields["c"], vec!["hello world"]);
    }

    #[test]
    fn test_params_only_set_present_fields() {
        let params = ActionParams::new(RequestUrl::parse("/ping"));
        assert_eq!(params.path(), "/ping");
        assert!(params.query.is_none());

        let params = ActionParams::new(RequestUrl::parse("/ping?q=1"))
            .with_form(Some(FieldMap::new()))
            .with_files(None);
        assert_eq!(params.query_value("q"), Some("1"));
        assert!(params.form.is_none());
        assert!(params.files.is_none());
    }

    #[test]
    fn test_invoke_binds_original_url() {
        let handler = Handler::new("t.any", |ctx, params| {
            let original = params.original_url.as_ref().map(ToString::to_string);
            ctx.success(None, original.as_deref(), Some("text/plain"))?;
            Ok(())
        });
        let action = Action::new(handler, Origin::Fallback).with_url(RequestUrl::parse("/a/b?z=1"));
        let mut ctx = RequestContext::new("GET", "/a/b/c");
        action
            .invoke(&mut ctx, ActionParams::new(RequestUrl::parse("/a/b/c")))
            .unwrap();
        assert_eq!(ctx.pending().body_text(), Some("/a/b?z=1"));
    }
}
