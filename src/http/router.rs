//! Named sub-routers.
//!
//! A [`SubRouter`] is a mountable engine registered on a server under an id.
//! It keeps a weak back-reference to its server so HTML error rendering can
//! use the server's hooks without keeping the server alive.

use std::convert::Infallible;
use std::sync::{Arc, Weak};

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, Route};
use axum::Router;
use tower::{Layer, Service};
use tower_http::catch_panic::CatchPanicLayer;

use crate::http::engine::{Engine, LiveRouter};
use crate::http::errors::{panic_response, HttpError, ServerOptions};
use crate::http::server::{ServerInstance, ServerShared};

pub struct SubRouter {
    id: String,
    engine: Engine,
    server: Weak<ServerShared>,
}

impl SubRouter {
    pub(crate) fn new(id: &str, options: Arc<ServerOptions>, server: Weak<ServerShared>) -> Self {
        Self {
            id: id.to_owned(),
            engine: Engine::new(options),
            server,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning server, if it is still alive.
    pub fn server(&self) -> Option<ServerInstance> {
        self.server.upgrade().map(ServerInstance::from_shared)
    }

    pub fn options(&self) -> &Arc<ServerOptions> {
        self.engine.options()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn route(&self, path: &str, method_router: MethodRouter) -> &Self {
        self.engine.route(path, method_router);
        self
    }

    /// Add a route whose errors render as HTML error pages.
    pub fn html_route(&self, path: &str, method_router: MethodRouter) -> &Self {
        let wrapped = method_router
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn_with_state(
                self.html_error_state(),
                render_html_errors,
            ));
        self.engine.route(path, wrapped);
        self
    }

    pub fn merge(&self, other: Router) -> &Self {
        self.engine.merge(other);
        self
    }

    pub fn layer<L>(&self, layer: L) -> &Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.engine.layer(layer);
        self
    }

    /// State for [`render_html_errors`], for callers composing the
    /// middleware themselves.
    pub fn html_error_state(&self) -> HtmlErrorState {
        HtmlErrorState {
            server: self.server.clone(),
            fallback: self.engine.options().clone(),
        }
    }

    pub(crate) fn service(&self) -> LiveRouter {
        self.engine.service()
    }

    pub fn router(&self) -> Router {
        self.engine.router()
    }
}

impl std::fmt::Debug for SubRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubRouter")
            .field("id", &self.id)
            .field("attached", &(self.server.strong_count() > 0))
            .finish()
    }
}

/// Where [`render_html_errors`] finds its `on_html_error` hook.
#[derive(Clone)]
pub struct HtmlErrorState {
    server: Weak<ServerShared>,
    fallback: Arc<ServerOptions>,
}

impl HtmlErrorState {
    fn options(&self) -> Arc<ServerOptions> {
        self.server
            .upgrade()
            .map(|server| server.options().clone())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Middleware rendering [`HttpError`]s with the owning server's
/// `on_html_error`.
pub async fn render_html_errors(
    State(state): State<HtmlErrorState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let head = parts.clone();
    let mut response = next.run(Request::from_parts(parts, body)).await;

    match response.extensions_mut().remove::<HttpError>() {
        Some(error) => {
            tracing::debug!(
                path = %head.uri.path(),
                status = error.status().as_u16(),
                "Rendering HTML error page"
            );
            state.options().on_html_error.respond(&error, &head)
        }
        None => response,
    }
}
