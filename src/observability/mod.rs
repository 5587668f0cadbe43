//! Observability subsystem.
//!
//! Structured logging through `tracing`. Every request carries an
//! `x-request-id` (see `http::request`) which `TraceLayer` records on its
//! span, so log lines for one request can be correlated.

pub mod logging;

pub use logging::init_logging;
