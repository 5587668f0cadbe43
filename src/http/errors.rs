//! Error model and default error responders.
//!
//! Handlers fail with [`HttpError`]. Its `IntoResponse` impl only records
//! the status and stashes the error in the response extensions; the engine
//! that dispatched the request then renders it with the request in hand
//! (see [`ServerOptions::respond`]). That keeps content negotiation out of
//! handler code.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value};

use crate::http::helpers::wants_json;
use crate::http::responder::send;
use crate::http::views::{escape_html, FileViewRenderer, ViewRenderer};

/// An error raised while handling a request.
#[derive(Clone)]
pub struct HttpError {
    status: StatusCode,
    message: Option<String>,
    view: Option<String>,
    details: Option<Map<String, Value>>,
    raw: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    no_match: bool,
}

impl HttpError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: None,
            view: None,
            details: None,
            raw: None,
            source: None,
            no_match: false,
        }
    }

    /// Build from a numeric code. Codes outside 100..=999 become 500.
    pub fn from_code(code: u16) -> Self {
        Self::new(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// Wrap an arbitrary error as a 500 carrying its message.
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut err = Self::new(StatusCode::INTERNAL_SERVER_ERROR).with_message(error.to_string());
        err.source = Some(Arc::new(error));
        err
    }

    /// An error thrown as bare text rather than a structured error.
    pub fn raw(status: StatusCode, text: impl Into<String>) -> Self {
        let mut err = Self::new(status);
        err.raw = Some(text.into());
        err
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Template name used by the HTML responder instead of the `N0X` default.
    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Extra fields merged into the JSON error body.
    pub fn with_details(mut self, details: Map<String, Value>) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn into_no_match(mut self) -> Self {
        self.no_match = true;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The explicit message, or the reason phrase for the status.
    pub fn message(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.raw.clone())
            .unwrap_or_else(|| reason(self.status).to_string())
    }

    pub fn view(&self) -> Option<&str> {
        self.view.as_deref()
    }

    pub fn details(&self) -> Option<&Map<String, Value>> {
        self.details.as_ref()
    }

    pub fn raw_text(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Set when the error comes from the engine finding no route.
    pub fn is_no_match(&self) -> bool {
        self.no_match
    }

    /// Serializable view of this error for templates and logs.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("status".into(), json!(self.status.as_u16()));
        out.insert("message".into(), json!(self.message()));
        if let Some(view) = &self.view {
            out.insert("view".into(), json!(view));
        }
        if let Some(details) = &self.details {
            out.insert("details".into(), Value::Object(details.clone()));
        }
        Value::Object(out)
    }
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Error")
}

impl fmt::Debug for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpError")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("view", &self.view)
            .field("raw", &self.raw)
            .field("no_match", &self.no_match)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message())
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

impl From<std::io::Error> for HttpError {
    fn from(error: std::io::Error) -> Self {
        Self::internal(error)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(error: serde_json::Error) -> Self {
        Self::internal(error)
    }
}

/// Response shape derived from a failed request.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub code: StatusCode,
    pub message: String,
    pub body: Option<Map<String, Value>>,
}

impl ErrorResponse {
    pub fn from_error(error: &HttpError) -> Self {
        Self {
            code: error.status(),
            message: error.message(),
            body: error.details().cloned(),
        }
    }

    /// `{code, message, ...body}`. Body keys win on conflict.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("code".into(), json!(self.code.as_u16()));
        out.insert("message".into(), json!(self.message));
        if let Some(body) = &self.body {
            for (key, value) in body {
                out.insert(key.clone(), value.clone());
            }
        }
        Value::Object(out)
    }
}

/// Turns a failed request into a response.
pub trait ErrorResponder: Send + Sync {
    fn respond(&self, error: &HttpError, request: &Parts) -> Response;
}

impl<F> ErrorResponder for F
where
    F: Fn(&HttpError, &Parts) -> Response + Send + Sync,
{
    fn respond(&self, error: &HttpError, request: &Parts) -> Response {
        self(error, request)
    }
}

/// Default `on_error`: JSON when the client asks for it, plain text
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorResponder;

impl ErrorResponder for JsonErrorResponder {
    fn respond(&self, error: &HttpError, request: &Parts) -> Response {
        let code = error.status();

        let body = if wants_json(request) {
            match error.raw_text() {
                Some(raw) => json!({ "statusCode": code.as_u16(), "message": raw }),
                None => ErrorResponse::from_error(error).to_json(),
            }
        } else {
            Value::String(error.message())
        };

        send(code, &body, None)
    }
}

/// Default `on_html_error`: renders `errors/<view>.html`.
#[derive(Clone)]
pub struct HtmlErrorResponder {
    renderer: Arc<dyn ViewRenderer>,
}

impl HtmlErrorResponder {
    pub fn new(renderer: Arc<dyn ViewRenderer>) -> Self {
        Self { renderer }
    }

    /// `404` → `40X`, `503` → `50X`.
    pub fn default_view(code: StatusCode) -> String {
        let digit = code.as_u16().to_string().chars().next().unwrap_or('5');
        format!("{digit}0X")
    }
}

impl ErrorResponder for HtmlErrorResponder {
    fn respond(&self, error: &HttpError, _request: &Parts) -> Response {
        let code = error.status();
        let message = error.message();
        let view = error
            .view()
            .map(str::to_owned)
            .unwrap_or_else(|| Self::default_view(code));
        let path = format!("errors/{view}.html");
        let locals = json!({
            "code": code.as_u16(),
            "message": message,
            "error": error.to_json(),
        });

        let html = match self.renderer.render_file(&path, &locals) {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(
                    template = %path,
                    error = %err,
                    "Error template unavailable, using built-in page"
                );
                fallback_page(code, &message)
            }
        };

        let headers = json!({ "content-type": "text/html; charset=utf-8" });
        send(code, &Value::String(html), headers.as_object())
    }
}

fn fallback_page(code: StatusCode, message: &str) -> String {
    let code_num = code.as_u16();
    let title = escape_html(reason(code));
    let message = escape_html(message);
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{code_num} {title}</title></head>\n\
         <body>\n<h1>{code_num} {title}</h1>\n<p>{message}</p>\n</body>\n</html>\n"
    )
}

/// Error handling hooks shared by an engine and its sub-routers.
#[derive(Clone)]
pub struct ServerOptions {
    pub on_error: Arc<dyn ErrorResponder>,
    pub on_html_error: Arc<dyn ErrorResponder>,
    /// Renders unmatched paths. `on_error` with a 404 when unset.
    pub on_no_match: Option<Arc<dyn ErrorResponder>>,
}

impl ServerOptions {
    /// Defaults with HTML error templates read from `views_dir`.
    pub fn with_views_dir(views_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            on_error: Arc::new(JsonErrorResponder),
            on_html_error: Arc::new(HtmlErrorResponder::new(Arc::new(FileViewRenderer::new(
                views_dir,
            )))),
            on_no_match: None,
        }
    }

    /// New options where every hook set in `overrides` replaces ours.
    pub fn merge(&self, overrides: &ServerOptionsOverrides) -> Self {
        Self {
            on_error: overrides
                .on_error
                .clone()
                .unwrap_or_else(|| self.on_error.clone()),
            on_html_error: overrides
                .on_html_error
                .clone()
                .unwrap_or_else(|| self.on_html_error.clone()),
            on_no_match: overrides
                .on_no_match
                .clone()
                .or_else(|| self.on_no_match.clone()),
        }
    }

    /// Render `error` with the hook that applies to it.
    pub fn respond(&self, error: &HttpError, request: &Parts) -> Response {
        match (&self.on_no_match, error.is_no_match()) {
            (Some(on_no_match), true) => on_no_match.respond(error, request),
            _ => self.on_error.respond(error, request),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::with_views_dir("views")
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("on_no_match", &self.on_no_match.is_some())
            .finish_non_exhaustive()
    }
}

/// Caller-supplied replacements for [`ServerOptions`] hooks.
#[derive(Clone, Default)]
pub struct ServerOptionsOverrides {
    pub on_error: Option<Arc<dyn ErrorResponder>>,
    pub on_html_error: Option<Arc<dyn ErrorResponder>>,
    pub on_no_match: Option<Arc<dyn ErrorResponder>>,
}

impl ServerOptionsOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error(mut self, responder: impl ErrorResponder + 'static) -> Self {
        self.on_error = Some(Arc::new(responder));
        self
    }

    pub fn on_html_error(mut self, responder: impl ErrorResponder + 'static) -> Self {
        self.on_html_error = Some(Arc::new(responder));
        self
    }

    pub fn on_no_match(mut self, responder: impl ErrorResponder + 'static) -> Self {
        self.on_no_match = Some(Arc::new(responder));
        self
    }
}

impl fmt::Debug for ServerOptionsOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptionsOverrides")
            .field("on_error", &self.on_error.is_some())
            .field("on_html_error", &self.on_html_error.is_some())
            .field("on_no_match", &self.on_no_match.is_some())
            .finish()
    }
}

/// Response for a panicking handler. The payload is logged, never sent.
pub(crate) fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());

    tracing::error!(panic = %detail, "Handler panicked");
    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::Request;

    fn parts(accept: Option<&str>) -> Parts {
        let mut builder = Request::builder();
        if let Some(accept) = accept {
            builder = builder.header("accept", accept);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    struct Missing;

    impl ViewRenderer for Missing {
        fn render_file(
            &self,
            path: &str,
            _locals: &Value,
        ) -> Result<String, crate::http::views::RenderError> {
            Err(crate::http::views::RenderError::NotFound(path.into()))
        }
    }

    struct Echo;

    impl ViewRenderer for Echo {
        fn render_file(
            &self,
            path: &str,
            locals: &Value,
        ) -> Result<String, crate::http::views::RenderError> {
            Ok(format!("{path}|{}|{}", locals["code"], locals["message"]))
        }
    }

    #[test]
    fn message_defaults_to_reason_phrase() {
        assert_eq!(HttpError::not_found().message(), "Not Found");
        assert_eq!(
            HttpError::not_found().with_message("No such user").message(),
            "No such user"
        );
    }

    #[test]
    fn from_code_rejects_invalid_codes() {
        assert_eq!(HttpError::from_code(404).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            HttpError::from_code(42).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn into_response_stashes_error() {
        let response = HttpError::from_code(409).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let stashed = response.extensions().get::<HttpError>().unwrap();
        assert_eq!(stashed.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = HttpError::from(io);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "disk on fire");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn error_response_details_override() {
        let mut details = Map::new();
        details.insert("field".into(), json!("email"));
        details.insert("message".into(), json!("Email is taken"));
        let err = HttpError::from_code(422).with_details(details);

        assert_eq!(
            ErrorResponse::from_error(&err).to_json(),
            json!({ "code": 422, "message": "Email is taken", "field": "email" })
        );
    }

    #[tokio::test]
    async fn json_responder_for_json_clients() {
        let err = HttpError::not_found().with_message("Not Found");
        let response = JsonErrorResponder.respond(&err, &parts(Some("application/json")));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body, json!({ "code": 404, "message": "Not Found" }));
    }

    #[tokio::test]
    async fn json_responder_raw_errors() {
        let err = HttpError::raw(StatusCode::BAD_REQUEST, "nope");

        let json_resp = JsonErrorResponder.respond(&err, &parts(Some("application/json")));
        let body: Value = serde_json::from_str(&body_string(json_resp).await).unwrap();
        assert_eq!(body, json!({ "statusCode": 400, "message": "nope" }));

        let text_resp = JsonErrorResponder.respond(&err, &parts(None));
        assert_eq!(body_string(text_resp).await, "nope");
    }

    #[tokio::test]
    async fn json_responder_plain_text_otherwise() {
        let err = HttpError::from_code(503);
        let response = JsonErrorResponder.respond(&err, &parts(Some("text/html")));
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
        assert_eq!(body_string(response).await, "Service Unavailable");
    }

    #[test]
    fn default_view_from_leading_digit() {
        assert_eq!(HtmlErrorResponder::default_view(StatusCode::NOT_FOUND), "40X");
        assert_eq!(
            HtmlErrorResponder::default_view(StatusCode::INTERNAL_SERVER_ERROR),
            "50X"
        );
        assert_eq!(HtmlErrorResponder::default_view(StatusCode::FORBIDDEN), "40X");
    }

    #[tokio::test]
    async fn html_responder_renders_view() {
        let responder = HtmlErrorResponder::new(Arc::new(Echo));
        let err = HttpError::from_code(404).with_message("gone");
        let response = responder.respond(&err, &parts(None));

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "errors/40X.html|404|\"gone\"");

        let custom = HttpError::from_code(500).with_view("maintenance");
        let response = responder.respond(&custom, &parts(None));
        assert!(body_string(response).await.starts_with("errors/maintenance.html|500|"));
    }

    #[tokio::test]
    async fn html_responder_falls_back_when_template_missing() {
        let responder = HtmlErrorResponder::new(Arc::new(Missing));
        let err = HttpError::from_code(500).with_message("<boom>");
        let response = responder.respond(&err, &parts(None));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        let html = body_string(response).await;
        assert!(html.contains("<h1>500 Internal Server Error</h1>"));
        assert!(html.contains("&lt;boom&gt;"));
    }

    #[tokio::test]
    async fn merge_prefers_overrides() {
        let defaults = ServerOptions::default();
        let overrides = ServerOptionsOverrides::new().on_error(|err: &HttpError, _: &Parts| {
            send(err.status(), &json!("custom"), None)
        });
        let merged = defaults.merge(&overrides);

        let response = merged.respond(&HttpError::from_code(418), &parts(None));
        assert_eq!(body_string(response).await, "custom");
        assert!(merged.on_no_match.is_none());
    }

    #[tokio::test]
    async fn no_match_uses_dedicated_hook() {
        let options = ServerOptions::default().merge(
            &ServerOptionsOverrides::new()
                .on_no_match(|_: &HttpError, _: &Parts| send(StatusCode::NOT_FOUND, &json!("nothing here"), None)),
        );

        let unmatched = HttpError::not_found().into_no_match();
        let response = options.respond(&unmatched, &parts(None));
        assert_eq!(body_string(response).await, "nothing here");

        let explicit = HttpError::not_found();
        let response = options.respond(&explicit, &parts(None));
        assert_eq!(body_string(response).await, "Not Found");
    }

    #[test]
    fn panic_response_is_500_error() {
        let response = panic_response(Box::new("kaboom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<HttpError>().is_some());
    }
}
