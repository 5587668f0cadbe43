//! Crate-level error type.

use std::net::SocketAddr;

use crate::config::ConfigError;
use crate::net::tls::TlsError;
use crate::subapp::context::ResolveError;

/// Boxed error returned by mounts and other user-supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced while creating, starting or initializing a server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The transport could not bind its listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// TLS material could not be loaded.
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),

    /// `listen` was called on an instance that is already serving.
    #[error("server is already listening on {0}")]
    AlreadyListening(SocketAddr),

    /// Module dependencies did not resolve.
    #[error("dependency resolution failed: {0}")]
    Dependency(#[from] ResolveError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A registered mount failed while attaching to the engine.
    #[error("mount `{name}` failed: {source}")]
    Mount {
        name: String,
        #[source]
        source: BoxError,
    },
}
