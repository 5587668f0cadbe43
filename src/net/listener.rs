//! Transport selection and socket binding.
//!
//! # Responsibilities
//! - Pick plain TCP or TLS from the listener config
//! - Bind eagerly so bind failures surface to the caller of `listen`
//! - Hand the bound socket to axum-server together with a shutdown handle

use std::net::SocketAddr;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ListenerConfig;
use crate::error::ServerError;
use crate::net::tls::load_tls_config;

/// The native listener flavor a server accepts connections with.
#[derive(Clone)]
pub enum Transport {
    /// Plain HTTP/1.1 and HTTP/2 (h2c).
    Plain,
    /// HTTPS with rustls.
    Tls(RustlsConfig),
}

impl Transport {
    /// Build the transport described by `config`. TLS material is loaded
    /// up front; failures are returned, not retried.
    pub async fn from_config(config: &ListenerConfig) -> Result<Self, ServerError> {
        if !config.https {
            return Ok(Transport::Plain);
        }
        let tls = config.tls.as_ref().ok_or_else(|| {
            ServerError::Config(crate::config::ConfigError::Validation(vec![
                crate::config::ValidationError::MissingTls,
            ]))
        })?;
        let rustls = load_tls_config(&tls.cert_path, &tls.key_path).await?;
        Ok(Transport::Tls(rustls))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Transport::Tls(_))
    }

    /// Spawn the serve loop for `app` on an already bound socket.
    pub fn serve(
        &self,
        listener: std::net::TcpListener,
        app: Router,
        handle: Handle,
    ) -> JoinHandle<std::io::Result<()>> {
        let service = app.into_make_service_with_connect_info::<SocketAddr>();
        match self {
            Transport::Plain => tokio::spawn(
                axum_server::from_tcp(listener)
                    .handle(handle)
                    .serve(service),
            ),
            Transport::Tls(config) => tokio::spawn(
                axum_server::from_tcp_rustls(listener, config.clone())
                    .handle(handle)
                    .serve(service),
            ),
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain => f.write_str("Plain"),
            Transport::Tls(_) => f.write_str("Tls"),
        }
    }
}

/// Bind `addr` and return a non-blocking std listener for axum-server.
pub async fn bind(addr: SocketAddr) -> Result<std::net::TcpListener, ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    let listener = listener
        .into_std()
        .map_err(|source| ServerError::Bind { addr, source })?;

    tracing::debug!(
        address = %addr,
        "Listener bound"
    );
    Ok(listener)
}
