//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the pre-flight
//! short-circuit, body collection, action resolution and invocation.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderMap, HeaderName, CONTENT_LENGTH, CONTENT_TYPE, EXPECT, REFERER, TRANSFER_ENCODING,
    USER_AGENT,
};
use hyper::{Method, Request, Response, Uri, Version};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::action::{
    parse_fields, Action, ActionParams, FieldMap, FileMap, Origin, Preflight, RequestUrl, Resolver,
};
use crate::config::AppState;
use crate::error::HandlerError;
use crate::handler::RequestContext;
use crate::http;
use crate::logger::{self, AccessLogEntry};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Everything `dispatch` needs from the network layer
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub method: String,
    /// Percent-decoded path and the raw query, kept apart
    pub url: RequestUrl,
    pub headers: HeaderMap,
    pub form: Option<FieldMap>,
    pub files: Option<FileMap>,
}

impl ActionRequest {
    /// Request for a raw `path?query` target
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        Self::from_url(method, RequestUrl::parse(target))
    }

    pub fn from_url(method: impl Into<String>, url: RequestUrl) -> Self {
        Self {
            method: method.into(),
            url,
            headers: HeaderMap::new(),
            form: None,
            files: None,
        }
    }
}

/// Response plus the action that produced it, if any
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response<Full<Bytes>>,
    pub action: Option<Arc<Action>>,
}

impl Dispatched {
    const fn plain(response: Response<Full<Bytes>>) -> Self {
        Self { response, action: None }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let entry = state
        .access_log_enabled()
        .then(|| access_entry(&req, peer_addr));

    let dispatched = route(req, &state).await;
    let response = http::with_server_header(dispatched.response, &state.config.http.server_name);

    if let Some(mut entry) = entry {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        if let Some(action) = &dispatched.action {
            entry.action = Some(action.handler().name().to_string());
            entry.origin = Some(action.origin().as_str());
        }
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn route<B>(req: Request<B>, state: &AppState) -> Dispatched
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    if !matches!(method, Method::GET | Method::HEAD | Method::POST | Method::PUT) {
        tracing::warn!("Method not implemented: {method}");
        return Dispatched::plain(http::build_501_response());
    }

    let url = decode_url(req.uri());
    let headers = req.headers().clone();
    let mut request = ActionRequest::from_url(method.as_str(), url);

    if announces_body(&headers) {
        if state.resolver.preflight(method.as_str(), &request.url) == Preflight::Reject {
            tracing::info!("No action for [{method} {}], body not read", request.url.path);
            return Dispatched::plain(http::build_404_response());
        }

        let max_body_size = state.config.http.max_body_size;
        if let Some(response) = check_body_size(&headers, max_body_size) {
            return Dispatched::plain(response);
        }
        let body = match read_body(req.into_body(), max_body_size).await {
            Ok(body) => body,
            Err(response) => return Dispatched::plain(response),
        };
        if method == Method::POST {
            request.form = parse_form(&headers, &body);
        }
    }

    request.headers = headers;
    dispatch(&state.resolver, request).await
}

/// Resolve and invoke the action for `request`.
///
/// A miss answers 404. A failing handler answers 500.
pub async fn dispatch(resolver: &Resolver, request: ActionRequest) -> Dispatched {
    let ActionRequest {
        method,
        url,
        headers,
        form,
        files,
    } = request;
    let target = url.to_string();

    let Some(action) = resolver.resolve_url(&method, url.clone()) else {
        tracing::error!("No action found for [{method} {target}]");
        return Dispatched::plain(http::build_404_response());
    };
    if action.origin() == Origin::Error {
        tracing::debug!(
            "Calling error handler \"{}\" for [{method} {}]",
            action.handler().name(),
            url.path
        );
    }

    let mut ctx = RequestContext::new(method.as_str(), url.path.as_str()).with_headers(headers);
    let params = ActionParams::new(url).with_form(form).with_files(files);

    let response = match action.invoke(&mut ctx, params) {
        Ok(()) => http::build_action_response(ctx.into_pending(), method == "HEAD").await,
        Err(HandlerError::Configuration(e)) => {
            tracing::error!(
                "Action \"{}\" is misconfigured for [{method} {target}]: {e}",
                action.handler().name()
            );
            http::build_500_response()
        }
        Err(e) => {
            tracing::error!(
                "Action \"{}\" failed for [{method} {target}]: {e}",
                action.handler().name()
            );
            http::build_500_response()
        }
    };

    Dispatched {
        response,
        action: Some(action),
    }
}

/// Percent-decoded path plus the raw query.
///
/// The two are never rejoined, so an encoded `%3F` stays part of the path.
fn decode_url(uri: &Uri) -> RequestUrl {
    RequestUrl {
        path: percent_decode_str(uri.path()).decode_utf8_lossy().into_owned(),
        query: uri.query().filter(|q| !q.is_empty()).map(ToString::to_string),
    }
}

fn announces_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) || headers.contains_key(EXPECT) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let size_str = headers.get(CONTENT_LENGTH)?.to_str().ok()?;
    match size_str.trim().parse::<u64>() {
        Ok(size) if size > max_body_size => {
            tracing::error!("Request body too large: {size} bytes (max: {max_body_size})");
            Some(http::build_413_response())
        }
        Ok(_) => None,
        Err(_) => {
            tracing::warn!("Invalid Content-Length value: '{size_str}', skipping size check");
            None
        }
    }
}

async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            tracing::error!("Request body exceeded {max_body_size} bytes");
            Err(http::build_413_response())
        }
        Err(e) => {
            tracing::warn!("Failed to read request body: {e}");
            Err(http::build_400_response())
        }
    }
}

fn parse_form(headers: &HeaderMap, body: &Bytes) -> Option<FieldMap> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if mime.eq_ignore_ascii_case(FORM_URLENCODED) {
        Some(parse_fields(&String::from_utf8_lossy(body)))
    } else {
        if mime.eq_ignore_ascii_case(MULTIPART) {
            tracing::debug!("multipart bodies are not parsed, dispatching without form");
        }
        None
    }
}

fn access_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
