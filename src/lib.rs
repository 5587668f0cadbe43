//! Sub-app HTTP server library.
//!
//! Wires an axum router into a module bootstrap workflow:
//! - `http::server`: server instances over plain or TLS transports, with a
//!   registry of mountable sub-routers
//! - `http::errors`: JSON and HTML error responders
//! - `http::helpers` / `http::responder`: request and response helpers
//! - `subapp`: dependency resolution, listen, middleware and routes mounts

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod subapp;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use error::{BoxError, ServerError};
pub use http::{create_server, CreateOptions, HttpError, ServerInstance, SubRouter};
pub use lifecycle::Shutdown;
pub use subapp::{initialize_subapp, ModuleContext, StaticContext, Subapp};
