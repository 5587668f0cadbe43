//! Live dispatch engine.
//!
//! An [`Engine`] owns an axum [`Router`] that can keep changing after the
//! server starts listening. Registration goes through a mutex and rebuilds
//! the router; the result is published through `ArcSwap`, so request
//! dispatch never takes a lock and always sees a complete router.
//!
//! ```text
//! route / merge / layer / mount
//!     → EngineState (routes + layer list + mounted prefixes)   [Mutex]
//!     → compose: apply layers, catch panics, render HttpError
//!     → ArcSwap<Router>                                        [lock-free]
//!     → LiveRouter::call (per request snapshot)
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, Route};
use axum::Router;
use futures_util::future::BoxFuture;
use tower::{Layer, Service, ServiceExt};
use tower_http::catch_panic::CatchPanicLayer;

use crate::http::errors::{panic_response, HttpError, ServerOptions};

/// A mount path collides with routes already registered on the engine.
#[derive(Debug, thiserror::Error)]
#[error("cannot mount at `{path}`: {reason}")]
pub struct MountConflict {
    pub path: String,
    pub reason: String,
}

type ApplyLayer = Arc<dyn Fn(Router) -> Router + Send + Sync>;

struct EngineState {
    routes: Router,
    layers: Vec<ApplyLayer>,
    mounts: HashSet<String>,
}

/// A router that accepts registrations while serving.
pub struct Engine {
    options: Arc<ServerOptions>,
    state: Mutex<EngineState>,
    live: Arc<ArcSwap<Router>>,
}

impl Engine {
    pub fn new(options: Arc<ServerOptions>) -> Self {
        let state = EngineState {
            routes: Router::new().fallback(no_match),
            layers: Vec::new(),
            mounts: HashSet::new(),
        };
        let live = Arc::new(ArcSwap::from_pointee(compose(&options, &state)));
        Self {
            options,
            state: Mutex::new(state),
            live,
        }
    }

    pub fn options(&self) -> &Arc<ServerOptions> {
        &self.options
    }

    /// Add a route. Forwarded to [`Router::route`] unchanged.
    ///
    /// # Panics
    ///
    /// Panics on the same inputs axum's `Router::route` panics on
    /// (invalid or conflicting paths).
    pub fn route(&self, path: &str, method_router: MethodRouter) {
        self.update(|state| state.routes = state.routes.clone().route(path, method_router));
    }

    /// Merge another router's routes into this one.
    ///
    /// # Panics
    ///
    /// Panics on overlapping routes, or if `other` has its own fallback.
    pub fn merge(&self, other: Router) {
        self.update(|state| state.routes = state.routes.clone().merge(other));
    }

    /// Wrap every route, including ones registered later, with `layer`.
    pub fn layer<L>(&self, layer: L)
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        let apply: ApplyLayer = Arc::new(move |router: Router| router.layer(layer.clone()));
        self.update(|state| state.layers.push(apply));
    }

    /// Nest `service` under `path`; `/` replaces the fallback instead.
    /// Returns `Ok(false)` if something is already mounted at `path`.
    ///
    /// A path overlapping a registered route is rejected with
    /// [`MountConflict`] and leaves the engine unchanged.
    pub fn mount(&self, path: &str, service: LiveRouter) -> Result<bool, MountConflict> {
        let mut state = self.lock();
        if state.mounts.contains(path) {
            return Ok(false);
        }

        let routes = if path == "/" {
            state.routes.clone().fallback_service(service)
        } else {
            let current = state.routes.clone();
            // axum reports overlapping routes by panicking.
            panic::catch_unwind(AssertUnwindSafe(|| current.nest_service(path, service)))
                .map_err(|payload| MountConflict {
                    path: path.to_owned(),
                    reason: panic_message(&*payload),
                })?
        };

        state.routes = routes;
        state.mounts.insert(path.to_owned());
        self.publish(&state);
        Ok(true)
    }

    pub fn is_mounted(&self, path: &str) -> bool {
        self.lock().mounts.contains(path)
    }

    /// Snapshot of the router as currently published.
    pub fn router(&self) -> Router {
        Router::clone(&self.live.load())
    }

    /// A service that always dispatches to the latest published router.
    pub fn service(&self) -> LiveRouter {
        LiveRouter {
            current: self.live.clone(),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut EngineState)) {
        let mut state = self.lock();
        apply(&mut state);
        self.publish(&state);
    }

    fn publish(&self, state: &EngineState) {
        self.live.store(Arc::new(compose(&self.options, state)));
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn compose(options: &Arc<ServerOptions>, state: &EngineState) -> Router {
    state
        .layers
        .iter()
        .fold(state.routes.clone(), |router, apply| apply(router))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(options.clone(), render_errors))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "route conflict".to_string())
}

async fn no_match() -> HttpError {
    HttpError::not_found().into_no_match()
}

/// Render any [`HttpError`] left in the response by this engine's routes.
async fn render_errors(
    State(options): State<Arc<ServerOptions>>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let head = parts.clone();
    let mut response = next.run(Request::from_parts(parts, body)).await;

    match response.extensions_mut().remove::<HttpError>() {
        Some(error) => {
            if error.status().is_server_error() {
                tracing::error!(
                    method = %head.method,
                    path = %head.uri.path(),
                    status = error.status().as_u16(),
                    error = %error,
                    "Request failed"
                );
            } else {
                tracing::debug!(
                    method = %head.method,
                    path = %head.uri.path(),
                    status = error.status().as_u16(),
                    "Request rejected"
                );
            }
            options.respond(&error, &head)
        }
        None => response,
    }
}

/// Tower service backed by an engine's published router.
#[derive(Clone)]
pub struct LiveRouter {
    current: Arc<ArcSwap<Router>>,
}

impl Service<Request> for LiveRouter {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let router = Router::clone(&self.current.load());
        Box::pin(async move { router.oneshot(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn engine() -> Engine {
        Engine::new(Arc::new(ServerOptions::default()))
    }

    #[tokio::test]
    async fn routes_registered_after_service_creation_are_visible() {
        let engine = engine();
        let service = engine.service();

        let before = service.clone().oneshot(get_request("/ping")).await.unwrap();
        assert_eq!(before.status(), StatusCode::NOT_FOUND);

        engine.route("/ping", get(|| async { "pong" }));
        let after = service.oneshot(get_request("/ping")).await.unwrap();
        assert_eq!(after.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn mount_nests_once() {
        let engine = engine();
        let child = self::engine();
        child.route("/users", get(|| async { "users" }));

        assert!(engine.mount("/admin", child.service()).unwrap());
        assert!(!engine.mount("/admin", child.service()).unwrap());
        assert!(engine.is_mounted("/admin"));

        let response = engine
            .router()
            .oneshot(get_request("/admin/users"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_mount_becomes_fallback() {
        let engine = engine();
        let child = self::engine();
        child.route("/hello", get(|| async { "hi" }));
        engine.route("/own", get(|| async { "own" }));

        assert!(engine.mount("/", child.service()).unwrap());

        let router = engine.router();
        let own = router.clone().oneshot(get_request("/own")).await.unwrap();
        assert_eq!(own.status(), StatusCode::OK);
        let hello = router.oneshot(get_request("/hello")).await.unwrap();
        assert_eq!(hello.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn conflicting_mount_leaves_engine_unchanged() {
        let engine = engine();
        engine.route("/admin", get(|| async { "own" }));
        let child = self::engine();
        child.route("/users", get(|| async { "users" }));

        let err = engine.mount("/admin", child.service()).unwrap_err();
        assert_eq!(err.path, "/admin");
        assert!(!engine.is_mounted("/admin"));

        let router = engine.router();
        let own = router.clone().oneshot(get_request("/admin")).await.unwrap();
        assert_eq!(own.status(), StatusCode::OK);
        let nested = router.oneshot(get_request("/admin/users")).await.unwrap();
        assert_eq!(nested.status(), StatusCode::NOT_FOUND);

        // A free path still mounts afterwards.
        assert!(engine.mount("/api", child.service()).unwrap());
    }

    #[tokio::test]
    async fn handler_errors_are_rendered() {
        let engine = engine();
        engine.route(
            "/teapot",
            get(|| async { Err::<(), _>(HttpError::from_code(418)) }),
        );

        let response = engine
            .router()
            .oneshot(get_request("/teapot"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert!(response.extensions().get::<HttpError>().is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"I'm a teapot");
    }
}
