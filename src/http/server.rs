//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the transport (plain or TLS) and the dispatch engine
//! - Keep a registry of named sub-routers (get-or-create)
//! - Mount sub-routers under path prefixes, also after `listen`
//! - Wire up ambient middleware (tracing, request ID, timeout, body limit)
//! - Bind and serve, with graceful shutdown

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::response::IntoResponse;
use axum::routing::{MethodRouter, Route};
use axum::Router;
use axum_server::Handle;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tower::{Layer, Service};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{HttpConfig, ListenerConfig, ServerConfig};
use crate::error::ServerError;
use crate::http::engine::Engine;
use crate::http::errors::{ServerOptions, ServerOptionsOverrides};
use crate::http::request::UuidRequestId;
use crate::http::router::SubRouter;
use crate::net::{self, Transport};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Inputs for [`ServerInstance::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Transport selection (`https`) and TLS material.
    pub listener: ListenerConfig,
    /// Limits, request ids and error views.
    pub http: HttpConfig,
    /// Error hooks replacing the defaults.
    pub server_options: ServerOptionsOverrides,
}

impl CreateOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            listener: config.listener.clone(),
            http: config.http.clone(),
            server_options: ServerOptionsOverrides::default(),
        }
    }

    pub fn with_server_options(mut self, overrides: ServerOptionsOverrides) -> Self {
        self.server_options = overrides;
        self
    }
}

struct Listening {
    local_addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<std::io::Result<()>>,
}

pub(crate) struct ServerShared {
    options: Arc<ServerOptions>,
    transport: Transport,
    engine: Engine,
    routers: DashMap<String, Arc<SubRouter>>,
    http: HttpConfig,
    listening: tokio::sync::Mutex<Option<Listening>>,
}

impl ServerShared {
    pub(crate) fn options(&self) -> &Arc<ServerOptions> {
        &self.options
    }
}

/// A dispatch engine bound to a transport, plus its sub-router registry.
///
/// Cheap to clone; clones share the same engine and registry.
#[derive(Clone)]
pub struct ServerInstance {
    shared: Arc<ServerShared>,
}

/// Alias of [`ServerInstance::create`].
pub async fn create_server(options: CreateOptions) -> Result<ServerInstance, ServerError> {
    ServerInstance::create(options).await
}

impl ServerInstance {
    /// Build the transport and engine. Caller-supplied error hooks take
    /// precedence over the defaults.
    pub async fn create(options: CreateOptions) -> Result<Self, ServerError> {
        let transport = Transport::from_config(&options.listener).await?;

        let defaults = ServerOptions::with_views_dir(options.http.views_dir.clone());
        let server_options = Arc::new(defaults.merge(&options.server_options));
        let engine = Engine::new(server_options.clone());

        tracing::debug!(
            tls = transport.is_tls(),
            request_timeout_secs = options.http.request_timeout_secs,
            max_body_size = options.http.max_body_size,
            "Server created"
        );

        Ok(Self {
            shared: Arc::new(ServerShared {
                options: server_options,
                transport,
                engine,
                routers: DashMap::new(),
                http: options.http,
                listening: tokio::sync::Mutex::new(None),
            }),
        })
    }

    pub(crate) fn from_shared(shared: Arc<ServerShared>) -> Self {
        Self { shared }
    }

    pub fn engine(&self) -> &Engine {
        &self.shared.engine
    }

    pub fn options(&self) -> &Arc<ServerOptions> {
        &self.shared.options
    }

    pub fn transport(&self) -> &Transport {
        &self.shared.transport
    }

    /// Alias of [`transport`](Self::transport).
    pub fn get_transport(&self) -> &Transport {
        self.transport()
    }

    /// Apply `layer` to the engine. No validation is performed.
    pub fn use_layer<L>(&self, layer: L) -> &Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.shared.engine.layer(layer);
        self
    }

    pub fn route(&self, path: &str, method_router: MethodRouter) -> &Self {
        self.shared.engine.route(path, method_router);
        self
    }

    pub fn merge(&self, other: Router) -> &Self {
        self.shared.engine.merge(other);
        self
    }

    /// Router registered under `id`, created with the server's options if
    /// missing. The same id always yields the same instance.
    pub fn get_router(&self, id: &str) -> Arc<SubRouter> {
        self.get_router_with(id, &ServerOptionsOverrides::default())
    }

    /// Like [`get_router`](Self::get_router), with hooks that replace the
    /// server's when the router is created. Ignored for existing routers.
    pub fn get_router_with(&self, id: &str, overrides: &ServerOptionsOverrides) -> Arc<SubRouter> {
        if let Some(existing) = self.shared.routers.get(id) {
            return existing.value().clone();
        }

        self.shared
            .routers
            .entry(id.to_owned())
            .or_insert_with(|| {
                tracing::debug!(router = %id, "Creating sub-router");
                let options = Arc::new(self.shared.options.merge(overrides));
                Arc::new(SubRouter::new(id, options, Arc::downgrade(&self.shared)))
            })
            .value()
            .clone()
    }

    /// Ids of every registered sub-router.
    pub fn router_ids(&self) -> Vec<String> {
        self.shared
            .routers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Mount the sub-router for `path` at that prefix.
    ///
    /// Returns `None` (and logs) when `path` cannot be used as a mount
    /// point, including when it overlaps a route registered on the server.
    /// Mounting the same path twice is a no-op.
    pub fn mount_router(&self, path: &str) -> Option<Arc<SubRouter>> {
        if !is_mount_path(path) {
            tracing::error!(route = %path, "Sub app \"{}\" not found", path);
            return None;
        }

        let router = self.get_router(path);
        match self.shared.engine.mount(path, router.service()) {
            Ok(true) => tracing::info!(route = %path, "Using route \"{}\"", path),
            Ok(false) => {}
            Err(e) => {
                tracing::error!(route = %path, error = %e, "Failed to mount sub app");
                return None;
            }
        }
        Some(router)
    }

    /// The service handed to the transport: the live engine wrapped in
    /// the ambient middleware stack.
    #[allow(deprecated)]
    pub fn app(&self) -> Router {
        let http = &self.shared.http;
        let mut app = Router::new().fallback_service(self.shared.engine.service());

        if http.request_timeout_secs > 0 {
            app = app.layer(TimeoutLayer::new(Duration::from_secs(
                http.request_timeout_secs,
            )));
        }
        app = app.layer(RequestBodyLimitLayer::new(http.max_body_size));
        if http.request_id {
            app = app
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId));
        }
        app.layer(TraceLayer::new_for_http())
    }

    /// Bind `addr` and start serving in the background.
    ///
    /// Returns the bound address (useful with port 0). Bind failures are
    /// returned as-is.
    pub async fn listen(&self, addr: SocketAddr) -> Result<SocketAddr, ServerError> {
        let mut listening = self.shared.listening.lock().await;
        if let Some(active) = listening.as_ref() {
            return Err(ServerError::AlreadyListening(active.local_addr));
        }

        let listener = net::bind(addr).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr, source })?;

        let handle = Handle::new();
        let task = self
            .shared
            .transport
            .serve(listener, self.app(), handle.clone());

        tracing::info!(
            address = %local_addr,
            tls = self.shared.transport.is_tls(),
            "Listening for connections"
        );

        *listening = Some(Listening {
            local_addr,
            handle,
            task,
        });
        Ok(local_addr)
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.shared
            .listening
            .lock()
            .await
            .as_ref()
            .map(|active| active.local_addr)
    }

    /// Stop accepting connections and drain in-flight requests.
    pub async fn shutdown(&self) {
        let Some(listening) = self.shared.listening.lock().await.take() else {
            return;
        };

        listening.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        match listening.task.await {
            Ok(Ok(())) => tracing::info!("HTTP server stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "HTTP server exited with error"),
            Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        }
    }
}

impl std::fmt::Debug for ServerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerInstance")
            .field("transport", &self.shared.transport)
            .field("routers", &self.router_ids())
            .finish_non_exhaustive()
    }
}

fn is_mount_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    path.starts_with('/')
        && !path.ends_with('/')
        && !path.contains("//")
        && !path.contains(['{', '}', '*'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_paths() {
        assert!(is_mount_path("/"));
        assert!(is_mount_path("/admin"));
        assert!(is_mount_path("/api/v1"));

        assert!(!is_mount_path(""));
        assert!(!is_mount_path("admin"));
        assert!(!is_mount_path("/admin/"));
        assert!(!is_mount_path("/a//b"));
        assert!(!is_mount_path("/users/{id}"));
        assert!(!is_mount_path("/files/*rest"));
    }
}
