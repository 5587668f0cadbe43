//! Configuration validation.
//!
//! Serde handles the syntax; this module checks semantics. All errors are
//! collected so a broken file can be fixed in one pass.

use std::net::IpAddr;

use crate::config::schema::ServerConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a [`ServerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.https is enabled but listener.tls is missing")]
    MissingTls,

    #[error("module.module_id must not be empty")]
    EmptyModuleId,

    #[error("module.module_id `{0}` must not contain path separators")]
    ModuleIdPath(String),

    #[error("listener.bind_address `{0}` is not an IP address")]
    BindAddress(String),

    #[error("observability.log_level `{0}` is not one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("http.max_body_size must be greater than zero")]
    BodyLimit,
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.https && config.listener.tls.is_none() {
        errors.push(ValidationError::MissingTls);
    }

    let module_id = &config.module.module_id;
    if module_id.trim().is_empty() {
        errors.push(ValidationError::EmptyModuleId);
    } else if module_id.contains('/') || module_id.contains('\\') {
        errors.push(ValidationError::ModuleIdPath(module_id.clone()));
    }

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.http.max_body_size == 0 {
        errors.push(ValidationError::BodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
