//! HTTP response building module
//!
//! Fixed status responses used by the router plus conversion of a handler's
//! `PendingResponse` into a hyper response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::ext::ReasonPhrase;
use hyper::header::{HeaderValue, CONTENT_LENGTH};
use hyper::{Response, StatusCode};
use tokio::fs;

use crate::handler::{PendingResponse, ResponseBody};

/// Methods the router dispatches
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT";

fn build_text_response(status: u16, text: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from_static(text.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error(status, &e);
            Response::new(Full::new(Bytes::from_static(text.as_bytes())))
        })
}

/// Build 400 Bad Request response
pub fn build_400_response() -> Response<Full<Bytes>> {
    build_text_response(400, "400 Bad Request")
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(404, "404 Not Found")
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_text_response(413, "413 Payload Too Large")
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    build_text_response(500, "500 Internal Server Error")
}

/// Build 501 Not Implemented response for unsupported methods
pub fn build_501_response() -> Response<Full<Bytes>> {
    let mut response = build_text_response(501, "501 Not Implemented");
    response
        .headers_mut()
        .insert("Allow", HeaderValue::from_static(ALLOWED_METHODS));
    response
}

/// Turn what a handler asked for into a response.
///
/// File bodies are read here; a file that cannot be read becomes a 404.
/// For HEAD requests the body is dropped but `Content-Length` is kept.
pub async fn build_action_response(pending: PendingResponse, is_head: bool) -> Response<Full<Bytes>> {
    let body = match pending.body() {
        ResponseBody::Empty => Bytes::new(),
        ResponseBody::Bytes(bytes) => bytes.clone(),
        ResponseBody::File(path) => match fs::read(path).await {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                tracing::warn!("Failed to read file '{}': {e}", path.display());
                return build_404_response();
            }
        },
    };

    let status = StatusCode::from_u16(pending.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_length = body.len();
    let body = if is_head { Bytes::new() } else { body };

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in pending.headers() {
        headers.insert(name.clone(), value.clone());
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));

    if let Some(reason) = pending.reason() {
        match ReasonPhrase::try_from(reason.to_string()) {
            Ok(phrase) => {
                response.extensions_mut().insert(phrase);
            }
            Err(e) => tracing::warn!("Dropping reason phrase {reason:?}: {e:?}"),
        }
    }

    response
}

/// Attach the `Server` header
pub fn with_server_header(mut response: Response<Full<Bytes>>, server_name: &str) -> Response<Full<Bytes>> {
    if let Ok(value) = HeaderValue::from_str(server_name) {
        response.headers_mut().insert("Server", value);
    }
    response
}

fn log_build_error(status: u16, error: &hyper::http::Error) {
    tracing::error!("Failed to build {status} response: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RequestContext;
    use http_body_util::BodyExt;

    async fn body_of(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_action_response_carries_reason_and_headers() {
        let mut ctx = RequestContext::new("GET", "/ping");
        ctx.success(Some("Pong"), Some("pong\n"), Some("text/plain")).unwrap();

        let response = build_action_response(ctx.into_pending(), false).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(response.headers()["content-length"], "5");
        assert_eq!(
            response.extensions().get::<ReasonPhrase>().map(ReasonPhrase::as_bytes),
            Some(&b"Pong"[..])
        );
        assert_eq!(body_of(response).await, "pong\n");
    }

    #[tokio::test]
    async fn test_head_drops_body_keeps_length() {
        let mut ctx = RequestContext::new("HEAD", "/");
        ctx.success(None, Some("hello"), Some("text/plain")).unwrap();

        let response = build_action_response(ctx.into_pending(), true).await;
        assert_eq!(response.headers()["content-length"], "5");
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_file_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.html");
        std::fs::write(&path, "<p>hi</p>").unwrap();

        let mut ctx = RequestContext::new("GET", "/page");
        ctx.send_file(&path, None).unwrap();
        let response = build_action_response(ctx.into_pending(), false).await;
        assert_eq!(response.headers()["content-type"], "text/html; charset=utf-8");
        assert_eq!(body_of(response).await, "<p>hi</p>");

        let mut ctx = RequestContext::new("GET", "/page");
        ctx.send_file(dir.path().join("missing.html"), None).unwrap();
        let response = build_action_response(ctx.into_pending(), false).await;
        assert_eq!(response.status(), 404);
    }

    #[test]
    fn test_501_lists_allowed_methods() {
        let response = build_501_response();
        assert_eq!(response.status(), 501);
        assert_eq!(response.headers()["allow"], ALLOWED_METHODS);
    }
}
