//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ListenerConfig
//!     → listener.rs (plain or TLS transport, eager bind)
//!     → tls.rs (PEM checks, rustls config)
//!     → axum-server serve loop with ConnectInfo<SocketAddr>
//! ```

pub mod listener;
pub mod tls;

pub use listener::{bind, Transport};
pub use tls::{load_tls_config, TlsError};
