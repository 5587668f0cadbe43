//! Request/response helpers.
//!
//! Pure functions with no shared state: content negotiation, header checks,
//! shallow object projection, client IP extraction and user serialization.
//! JSON-shaped inputs are `serde_json` maps so they can come straight from
//! request bodies or handler replies.

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{header, request::Parts, Extensions, HeaderMap, Request};
use serde_json::{Map, Value};

/// Fields kept by [`serialize_user`] when none are given.
pub const DEFAULT_USER_FIELDS: &[&str] = &["id", "email", "avatar"];

/// Read access to the parts of a request the helpers inspect.
pub trait RequestHead {
    fn headers(&self) -> &HeaderMap;
    fn extensions(&self) -> &Extensions;
}

impl<B> RequestHead for Request<B> {
    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn extensions(&self) -> &Extensions {
        Request::extensions(self)
    }
}

impl RequestHead for Parts {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

/// Client address resolved by an upstream layer (e.g. a trusted proxy
/// protocol decoder). Last resort before the caller's fallback in
/// [`get_ip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub IpAddr);

fn accepts<R: RequestHead + ?Sized>(request: &R, needle: &str) -> bool {
    request
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains(needle))
        .unwrap_or(false)
}

/// True when the `Accept` header mentions `json`.
pub fn wants_json<R: RequestHead + ?Sized>(request: &R) -> bool {
    accepts(request, "json")
}

/// True when the `Accept` header mentions `html`.
pub fn wants_html<R: RequestHead + ?Sized>(request: &R) -> bool {
    accepts(request, "html")
}

/// JavaScript-style truthiness for JSON values.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Check a JSON header map for `name`, matching on the lower-cased key.
/// Present-but-empty values count as absent.
pub fn has_header(headers: Option<&Map<String, Value>>, name: &str) -> bool {
    headers
        .and_then(|h| h.get(&name.to_ascii_lowercase()))
        .map(is_truthy)
        .unwrap_or(false)
}

/// Shallow-copy `source` into `target`.
///
/// With a non-empty `allowed_keys`, only those keys are copied (and only
/// when `source` has them). Otherwise every key is copied. A missing source
/// leaves `target` untouched.
pub fn clone_object(
    source: Option<&Map<String, Value>>,
    allowed_keys: &[&str],
    mut target: Map<String, Value>,
) -> Map<String, Value> {
    let Some(source) = source else {
        return target;
    };

    for (key, value) in source {
        if allowed_keys.is_empty() || allowed_keys.contains(&key.as_str()) {
            target.insert(key.clone(), value.clone());
        }
    }
    target
}

/// Resolve the client IP for a request.
///
/// Lookup order: last `x-forwarded-for` entry, the connection peer
/// (`ConnectInfo<SocketAddr>`), a bare `SocketAddr` extension, then a
/// [`ClientAddr`] extension. Falls back to `fallback` when none resolve.
pub fn get_ip(request: Option<&dyn RequestHead>, fallback: Option<&str>) -> Option<String> {
    request
        .and_then(|req| {
            forwarded_for(req)
                .or_else(|| {
                    req.extensions()
                        .get::<ConnectInfo<SocketAddr>>()
                        .map(|info| info.0.ip().to_string())
                })
                .or_else(|| {
                    req.extensions()
                        .get::<SocketAddr>()
                        .map(|addr| addr.ip().to_string())
                })
                .or_else(|| {
                    req.extensions()
                        .get::<ClientAddr>()
                        .map(|addr| addr.0.to_string())
                })
        })
        .or_else(|| fallback.map(str::to_owned))
}

fn forwarded_for(request: &dyn RequestHead) -> Option<String> {
    let value = request.headers().get("x-forwarded-for")?.to_str().ok()?;
    let last = value.rsplit(',').next()?.trim();
    (!last.is_empty()).then(|| last.to_owned())
}

/// Project a user record onto `fields` (default [`DEFAULT_USER_FIELDS`]),
/// keeping only the keys the user actually has.
pub fn serialize_user(
    user: Option<&Map<String, Value>>,
    fields: Option<&[&str]>,
) -> Map<String, Value> {
    let fields = fields.unwrap_or(DEFAULT_USER_FIELDS);
    let mut out = Map::new();
    let Some(user) = user else {
        return out;
    };

    for field in fields {
        if let Some(value) = user.get(*field) {
            out.insert((*field).to_owned(), value.clone());
        }
    }
    out
}

/// Extract the body of a handler reply.
///
/// A reply that already wraps its payload under `body_keyword` is returned
/// verbatim. Otherwise all keys except `ignore_keys` are copied into a new
/// object.
pub fn decode_response_body(
    reply: &Map<String, Value>,
    ignore_keys: &[String],
    body_keyword: &str,
) -> Value {
    if let Some(body) = reply.get(body_keyword).filter(|b| !b.is_null()) {
        return body.clone();
    }

    let out: Map<String, Value> = reply
        .iter()
        .filter(|(key, _)| !ignore_keys.iter().any(|ignored| ignored == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn request_with(name: &str, value: &str) -> Request<Body> {
        Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn has_header_matches_lowercased_names() {
        let headers = object(json!({
            "accept": "application/json",
            "content-type": "application/json",
        }));

        assert!(has_header(Some(&headers), "accept"));
        assert!(has_header(Some(&headers), "Content-Type"));
        assert!(has_header(Some(&headers), "CONTENT-TYPE"));
        assert!(!has_header(Some(&headers), "x-powered-by"));
        assert!(!has_header(None, "x-powered-by"));
    }

    #[test]
    fn has_header_ignores_empty_values() {
        let headers = object(json!({ "content-type": "", "x-flag": false }));
        assert!(!has_header(Some(&headers), "content-type"));
        assert!(!has_header(Some(&headers), "x-flag"));
    }

    #[test]
    fn wants_json_reads_accept() {
        assert!(wants_json(&request_with("accept", "application/json")));
        assert!(!wants_json(&request_with("accept", "text/html")));
        assert!(!wants_json(&Request::new(Body::empty())));
    }

    #[test]
    fn wants_html_reads_accept() {
        assert!(wants_html(&request_with("accept", "text/html")));
        assert!(!wants_html(&request_with("accept", "application/json")));
        assert!(!wants_html(&Request::new(Body::empty())));
    }

    #[test]
    fn content_negotiation_is_case_sensitive() {
        assert!(!wants_json(&request_with("accept", "application/JSON")));
    }

    #[test]
    fn wants_json_works_on_parts() {
        let (parts, _) = request_with("accept", "application/json").into_parts();
        assert!(wants_json(&parts));
    }

    #[test]
    fn serialize_user_defaults() {
        let user = object(json!({
            "id": 1,
            "email": "test@me.com",
            "avatar": "image.png",
            "nick": "peperone",
            "firstName": "pepe",
            "lastName": "rone",
        }));

        assert_eq!(
            Value::Object(serialize_user(Some(&user), None)),
            json!({ "id": 1, "email": "test@me.com", "avatar": "image.png" })
        );
        assert_eq!(
            Value::Object(serialize_user(
                Some(&user),
                Some(&["nick", "firstName", "lastName"][..])
            )),
            json!({ "nick": "peperone", "firstName": "pepe", "lastName": "rone" })
        );
        assert!(serialize_user(None, None).is_empty());
    }

    #[test]
    fn serialize_user_skips_missing_fields() {
        let user = object(json!({ "id": 7 }));
        assert_eq!(
            Value::Object(serialize_user(Some(&user), None)),
            json!({ "id": 7 })
        );
    }

    #[test]
    fn get_ip_prefers_forwarded_for() {
        let req = request_with("x-forwarded-for", "10.10.10.10");
        assert_eq!(get_ip(Some(&req), None).as_deref(), Some("10.10.10.10"));

        let chained = request_with("x-forwarded-for", "1.1.1.1, 2.2.2.2");
        assert_eq!(get_ip(Some(&chained), None).as_deref(), Some("2.2.2.2"));
    }

    #[test]
    fn get_ip_uses_connection_peer() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut()
            .insert(ConnectInfo("10.10.10.10:5000".parse::<SocketAddr>().unwrap()));
        req.extensions_mut()
            .insert("192.168.0.1:80".parse::<SocketAddr>().unwrap());
        assert_eq!(get_ip(Some(&req), None).as_deref(), Some("10.10.10.10"));
    }

    #[test]
    fn get_ip_uses_socket_address() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut()
            .insert("10.10.10.10:80".parse::<SocketAddr>().unwrap());
        req.extensions_mut()
            .insert(ClientAddr("172.16.0.1".parse().unwrap()));
        assert_eq!(get_ip(Some(&req), None).as_deref(), Some("10.10.10.10"));
    }

    #[test]
    fn get_ip_uses_client_addr_last() {
        let mut req = Request::new(Body::empty());
        req.extensions_mut()
            .insert(ClientAddr("10.10.10.10".parse().unwrap()));
        assert_eq!(get_ip(Some(&req), None).as_deref(), Some("10.10.10.10"));
    }

    #[test]
    fn get_ip_fallbacks() {
        assert_eq!(get_ip(None, None), None);
        assert_eq!(get_ip(None, Some("localhost")).as_deref(), Some("localhost"));

        let req = Request::new(Body::empty());
        assert_eq!(get_ip(Some(&req), None), None);
        assert_eq!(get_ip(Some(&req), Some("localhost")).as_deref(), Some("localhost"));

        let empty = request_with("x-forwarded-for", "");
        assert_eq!(get_ip(Some(&empty), Some("fallback")).as_deref(), Some("fallback"));
    }

    #[test]
    fn clone_object_copies() {
        let options = object(json!({
            "host": "127.0.0.1",
            "method": "CONNECT",
            "path": "www.google.com:80",
        }));
        let mut request = options.clone();
        request.insert("agent".into(), json!({ "keepAlive": false }));

        assert_eq!(clone_object(Some(&options), &[], Map::new()), options);
        assert_eq!(
            clone_object(Some(&request), &["host", "method", "path"], Map::new()),
            options
        );

        let out = object(json!({ "test": true }));
        assert_eq!(
            Value::Object(clone_object(Some(&request), &["host", "method", "path"], out)),
            json!({
                "test": true,
                "host": "127.0.0.1",
                "method": "CONNECT",
                "path": "www.google.com:80",
            })
        );

        assert!(clone_object(None, &[], Map::new()).is_empty());
        assert!(clone_object(None, &["host"], Map::new()).is_empty());
    }

    #[test]
    fn clone_object_skips_absent_allowed_keys() {
        let src = object(json!({ "a": 1 }));
        assert_eq!(
            Value::Object(clone_object(Some(&src), &["a", "b"], Map::new())),
            json!({ "a": 1 })
        );
    }

    #[test]
    fn decode_response_body_fast_path() {
        let reply = object(json!({ "body": { "ok": true }, "$meta": { "statusCode": 201 } }));
        assert_eq!(
            decode_response_body(&reply, &["$meta".into()], "body"),
            json!({ "ok": true })
        );
    }

    #[test]
    fn decode_response_body_strips_ignored_keys() {
        let reply = object(json!({ "id": 3, "name": "x", "$meta": { "statusCode": 201 } }));
        assert_eq!(
            decode_response_body(&reply, &["$meta".into()], "body"),
            json!({ "id": 3, "name": "x" })
        );
    }
}
