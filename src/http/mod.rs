//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (ambient middleware: trace, request id, body limit, timeout)
//!     → engine.rs (live router snapshot, panic capture, HttpError rendering)
//!     → router.rs (mounted sub-router, optional HTML error pages)
//!     → handler (responder.rs / helpers.rs)
//!     → Send to client
//! ```

pub mod engine;
pub mod errors;
pub mod helpers;
pub mod request;
pub mod responder;
pub mod router;
pub mod server;
pub mod views;

pub use engine::{Engine, LiveRouter, MountConflict};
pub use errors::{
    ErrorResponder, ErrorResponse, HtmlErrorResponder, HttpError, JsonErrorResponder,
    ServerOptions, ServerOptionsOverrides,
};
pub use helpers::{ClientAddr, RequestHead};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use responder::{make_responder, redirect, send, Responder, ResponderOptions};
pub use router::{render_html_errors, HtmlErrorState, SubRouter};
pub use server::{create_server, CreateOptions, ServerInstance};
pub use views::{FileViewRenderer, RenderError, ViewRenderer};
