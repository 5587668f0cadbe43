//! Response assembly.
//!
//! [`send`] is the single primitive every response in this crate goes
//! through: the default error responders, [`Responder::respond_to`] and
//! [`redirect`] all build on it, so content-type defaults stay consistent.

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{Map, Value};

use crate::http::helpers::{decode_response_body, has_header, wants_html, wants_json, RequestHead};

const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Send `body` with `status`.
///
/// Strings go out as `text/plain`, other JSON values are serialized as
/// `application/json`, unless `headers` already carries a content type.
/// A null or empty body is replaced by the status reason phrase.
pub fn send(status: StatusCode, body: &Value, headers: Option<&Map<String, Value>>) -> Response {
    let given = headers.and_then(content_type);

    let (content_type, payload) = match body {
        Value::String(text) if !text.is_empty() => {
            (given.unwrap_or("text/plain"), text.clone().into_bytes())
        }
        Value::Null | Value::String(_) => (
            given.unwrap_or("text/plain"),
            status
                .canonical_reason()
                .unwrap_or_default()
                .as_bytes()
                .to_vec(),
        ),
        other => (given.unwrap_or(JSON_UTF8), other.to_string().into_bytes()),
    };

    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = status;

    let out = response.headers_mut();
    for (name, value) in headers.into_iter().flatten() {
        if name.eq_ignore_ascii_case("content-type") {
            continue;
        }
        match header_pair(name, value) {
            Some((name, value)) => {
                out.insert(name, value);
            }
            None => tracing::warn!(header = %name, "Skipping invalid response header"),
        }
    }
    match HeaderValue::from_str(content_type) {
        Ok(value) => {
            out.insert(CONTENT_TYPE, value);
        }
        Err(_) => tracing::warn!(content_type, "Skipping invalid content type"),
    }

    response
}

/// Redirect to `location` (302 unless `status` is given).
pub fn redirect(location: &str, status: Option<StatusCode>) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status.unwrap_or(StatusCode::FOUND);
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(_) => tracing::warn!(location, "Redirect target is not a valid header value"),
    }
    response
}

fn content_type(headers: &Map<String, Value>) -> Option<&str> {
    headers
        .get("content-type")
        .or_else(|| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                .map(|(_, value)| value)
        })
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn header_pair(name: &str, value: &Value) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let value = match value {
        Value::String(s) => HeaderValue::from_str(s).ok()?,
        Value::Number(n) => HeaderValue::from_str(&n.to_string()).ok()?,
        Value::Bool(b) => HeaderValue::from_static(if *b { "true" } else { "false" }),
        _ => return None,
    };
    Some((name, value))
}

/// Body decoder used by [`Responder`]: `(reply, ignore_keys, body_keyword)`.
pub type DecodeBody = fn(&Map<String, Value>, &[String], &str) -> Value;

/// Options for [`make_responder`].
#[derive(Debug, Clone)]
pub struct ResponderOptions {
    /// Reply key holding `statusCode` and `headers`.
    pub metadata_keyword: String,
    /// Reply key that, when present, is sent as the body verbatim.
    pub body_keyword: String,
    /// Reply keys never copied into a decoded body.
    pub ignore_keys: Vec<String>,
    /// Body decoder.
    pub decode: DecodeBody,
}

impl Default for ResponderOptions {
    fn default() -> Self {
        Self {
            metadata_keyword: "$meta".to_string(),
            body_keyword: "body".to_string(),
            ignore_keys: vec!["$meta".to_string()],
            decode: decode_response_body,
        }
    }
}

/// Turns reply events into HTTP responses for one request.
#[derive(Debug, Clone)]
pub struct Responder {
    wants_html: bool,
    wants_json: bool,
    options: ResponderOptions,
}

/// Build a [`Responder`] bound to the content preferences of `request`.
pub fn make_responder<R: RequestHead + ?Sized>(request: &R, options: ResponderOptions) -> Responder {
    Responder {
        wants_html: wants_html(request),
        wants_json: wants_json(request),
        options,
    }
}

impl Responder {
    /// Send `event.response`, reading status and headers from its metadata.
    pub fn respond_to(&self, event: &Value) -> Response {
        let empty = Map::new();
        let reply = event
            .get("response")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let body = (self.options.decode)(
            reply,
            &self.options.ignore_keys,
            &self.options.body_keyword,
        );

        let meta = reply.get(&self.options.metadata_keyword);
        let status = meta
            .and_then(|m| m.get("statusCode"))
            .and_then(Value::as_u64)
            .unwrap_or(200);
        let status = u16::try_from(status)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or_else(|| {
                tracing::warn!(status, "Invalid reply status code, sending 500");
                StatusCode::INTERNAL_SERVER_ERROR
            });

        let mut headers = meta
            .and_then(|m| m.get("headers"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        if self.wants_html {
            headers.insert("content-type".into(), Value::from("text/html"));
        }
        if self.wants_json && !has_header(Some(&headers), "content-type") {
            headers.insert("content-type".into(), Value::from("application/json"));
        }

        send(status, &body, Some(&headers))
    }
}
