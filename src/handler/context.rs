//! Request context handed to action handlers
//!
//! Handlers describe their response through the context; the router turns
//! the resulting `PendingResponse` into bytes once the handler returns.

use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::StatusCode;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{ConfigurationError, HandlerError};
use crate::http::mime;

/// Body recorded by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Empty,
    Bytes(Bytes),
    /// Read from disk when the response is built
    File(PathBuf),
}

/// Response a handler has asked for
#[derive(Debug, Clone)]
pub struct PendingResponse {
    status: u16,
    reason: Option<String>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: ResponseBody,
}

impl Default for PendingResponse {
    fn default() -> Self {
        Self::new(200)
    }
}

impl PendingResponse {
    const fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: ResponseBody::Empty,
        }
    }

    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Custom reason phrase, if the handler gave one
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.to_str().ok())
    }

    pub const fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// In-memory body as UTF-8, if any
    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.retain(|(n, _)| *n != name);
        self.headers.push((name, value));
    }
}

/// Per-request handle passed to every handler
#[derive(Debug)]
pub struct RequestContext {
    method: String,
    path: String,
    headers: HeaderMap,
    response: PendingResponse,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: HeaderMap::new(),
            response: PendingResponse::default(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request header value, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replace the response with `status`, an optional reason phrase and optional text content.
    ///
    /// The content type header is only sent when given.
    pub fn reply(
        &mut self,
        status: u16,
        message: Option<&str>,
        content: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        let mut response = new_response(status, message)?;
        if let Some(content) = content.filter(|c| !c.is_empty()) {
            if let Some(content_type) = content_type {
                response.set_header(CONTENT_TYPE, header_value("content-type", content_type)?);
            }
            response.body = ResponseBody::Bytes(Bytes::copy_from_slice(content.as_bytes()));
        }
        self.response = response;
        Ok(())
    }

    /// `200 OK` shortcut for `reply`
    pub fn success(
        &mut self,
        message: Option<&str>,
        content: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        self.reply(200, message, content, content_type)
    }

    /// Send `value` as a JSON document followed by a newline
    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), HandlerError> {
        let mut body = serde_json::to_vec(value)?;
        body.push(b'\n');
        self.send_bytes(body, Some("application/json"))?;
        Ok(())
    }

    /// Send raw content. Raw bytes carry no type information, so `content_type` is mandatory.
    pub fn send_bytes(
        &mut self,
        content: impl Into<Bytes>,
        content_type: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        let content_type = content_type.ok_or(ConfigurationError::MissingContentType)?;
        let mut response = PendingResponse::new(200);
        response.set_header(CONTENT_TYPE, header_value("content-type", content_type)?);
        response.body = ResponseBody::Bytes(content.into());
        self.response = response;
        Ok(())
    }

    /// Send a file from disk; the type is guessed from the extension unless given.
    ///
    /// A missing file turns into a 404 when the response is built.
    pub fn send_file(
        &mut self,
        path: impl AsRef<Path>,
        content_type: Option<&str>,
    ) -> Result<(), ConfigurationError> {
        let path = path.as_ref();
        let value = match content_type {
            Some(t) => header_value("content-type", t)?,
            None => HeaderValue::from_static(mime::guess_for_path(path)),
        };

        let mut response = PendingResponse::new(200);
        response.set_header(CONTENT_TYPE, value);
        response.body = ResponseBody::File(path.to_path_buf());
        self.response = response;
        Ok(())
    }

    /// Plain-text error page for `status`
    pub fn send_error(&mut self, status: u16) {
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Error");
        let mut response = PendingResponse::new(status);
        response.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response.body = ResponseBody::Bytes(Bytes::from(format!("{status} {reason}")));
        self.response = response;
    }

    pub fn redirect(&mut self, target: &str, code: u16) -> Result<(), ConfigurationError> {
        let mut response = new_response(code, None)?;
        response.set_header(LOCATION, header_value("location", target)?);
        response.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response.body = ResponseBody::Bytes(Bytes::from_static(b"Redirecting..."));
        self.response = response;
        Ok(())
    }

    /// Add or replace a header on the pending response
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ConfigurationError> {
        let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            ConfigurationError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.response.set_header(header, header_value(name, value)?);
        Ok(())
    }

    pub const fn pending(&self) -> &PendingResponse {
        &self.response
    }

    pub fn into_pending(self) -> PendingResponse {
        self.response
    }
}

fn new_response(status: u16, message: Option<&str>) -> Result<PendingResponse, ConfigurationError> {
    StatusCode::from_u16(status).map_err(|_| ConfigurationError::InvalidStatus(status))?;
    let mut response = PendingResponse::new(status);
    if let Some(message) = message {
        if !is_valid_reason(message) {
            return Err(ConfigurationError::InvalidReasonPhrase(message.to_string()));
        }
        response.reason = Some(message.to_string());
    }
    Ok(response)
}

fn is_valid_reason(message: &str) -> bool {
    message
        .bytes()
        .all(|b| b == b'\t' || b == b' ' || b.is_ascii_graphic() || b >= 0x80)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigurationError> {
    HeaderValue::from_str(value).map_err(|e| ConfigurationError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_reason_and_content() {
        let mut ctx = RequestContext::new("GET", "/ping");
        ctx.success(Some("Pong"), Some("Blah"), Some("text/plain")).unwrap();
        let pending = ctx.pending();
        assert_eq!(pending.status(), 200);
        assert_eq!(pending.reason(), Some("Pong"));
        assert_eq!(pending.header("Content-Type"), Some("text/plain"));
        assert_eq!(pending.body_text(), Some("Blah"));
    }

    #[test]
    fn test_reply_without_content_type_sends_no_header() {
        let mut ctx = RequestContext::new("GET", "/");
        ctx.reply(202, None, Some("queued"), None).unwrap();
        assert_eq!(ctx.pending().status(), 202);
        assert_eq!(ctx.pending().header("content-type"), None);
        assert_eq!(ctx.pending().body_text(), Some("queued"));
    }

    #[test]
    fn test_raw_content_without_type_fails_loudly() {
        let mut ctx = RequestContext::new("GET", "/");
        let err = ctx.send_bytes(&b"\x00\x01"[..], None).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingContentType);
    }

    #[test]
    fn test_invalid_reply_values() {
        let mut ctx = RequestContext::new("GET", "/");
        assert_eq!(
            ctx.reply(42, None, None, None).unwrap_err(),
            ConfigurationError::InvalidStatus(42)
        );
        assert!(matches!(
            ctx.reply(200, Some("bad\r\nphrase"), None, None),
            Err(ConfigurationError::InvalidReasonPhrase(_))
        ));
        assert!(ctx.set_header("bad header", "x").is_err());
    }

    #[test]
    fn test_send_json_appends_newline() {
        let mut ctx = RequestContext::new("GET", "/");
        ctx.send_json(&serde_json::json!({"ok": true})).unwrap();
        assert_eq!(ctx.pending().header("content-type"), Some("application/json"));
        assert_eq!(ctx.pending().body_text(), Some("{\"ok\":true}\n"));
    }

    #[test]
    fn test_send_file_guesses_type() {
        let mut ctx = RequestContext::new("GET", "/");
        ctx.send_file("static/logo.png", None).unwrap();
        assert_eq!(ctx.pending().header("content-type"), Some("image/png"));
        assert_eq!(
            ctx.pending().body(),
            &ResponseBody::File(PathBuf::from("static/logo.png"))
        );

        ctx.send_file("data.bin", Some("application/x-custom")).unwrap();
        assert_eq!(ctx.pending().header("content-type"), Some("application/x-custom"));
    }

    #[test]
    fn test_send_file_rejects_invalid_type() {
        let mut ctx = RequestContext::new("GET", "/");
        let err = ctx.send_file("logo.png", Some("image/png\r\n")).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidHeader { .. }));
        assert_eq!(ctx.pending().body(), &ResponseBody::Empty);
    }

    #[test]
    fn test_send_error_and_redirect() {
        let mut ctx = RequestContext::new("GET", "/");
        ctx.send_error(404);
        assert_eq!(ctx.pending().body_text(), Some("404 Not Found"));

        ctx.redirect("/home", 301).unwrap();
        assert_eq!(ctx.pending().status(), 301);
        assert_eq!(ctx.pending().header("location"), Some("/home"));
    }
}
