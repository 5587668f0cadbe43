//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.
//! Every section carries defaults so an empty file is a valid config.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Root configuration for a module server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Module identity, dependencies and on-disk layout.
    pub module: ModuleConfig,

    /// Listener configuration (bind address, port, TLS).
    pub listener: ListenerConfig,

    /// Request handling limits and error views.
    pub http: HttpConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Public address announced once all modules resolved.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.module.base_url {
            return url.clone();
        }
        let scheme = if self.listener.https { "https" } else { "http" };
        format!(
            "{}://{}:{}",
            scheme, self.listener.bind_address, self.listener.port
        )
    }

    /// Apply caller-supplied overrides. Any value set in `overrides` wins
    /// over what was loaded from file or defaults.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(bind_address) = overrides.bind_address {
            self.listener.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.listener.port = port;
        }
        if let Some(module_dir) = overrides.module_dir {
            self.module.module_dir = Some(module_dir);
        }
        if let Some(log_level) = overrides.log_level {
            self.observability.log_level = log_level;
        }
        self
    }
}

/// Explicit overrides layered on top of a loaded [`ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub module_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Module identity and layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Module identifier, used for logging and directory lookup.
    pub module_id: String,

    /// Dependencies that must resolve before the server is created.
    pub dependencies: Vec<String>,

    /// Whether unresolved dependencies are tolerated.
    pub optional_dependencies: bool,

    /// Announced base URL. Derived from the listener when unset.
    pub base_url: Option<String>,

    /// Absolute module directory. Relative values are ignored in favor of
    /// `<modules_root>/<module_id>`.
    pub module_dir: Option<PathBuf>,

    /// Conventional root holding one directory per module.
    pub modules_root: PathBuf,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            module_id: "server".to_string(),
            dependencies: Vec::new(),
            optional_dependencies: true,
            base_url: None,
            module_dir: None,
            modules_root: PathBuf::from("./modules"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Listening port. `0` picks an ephemeral port.
    pub port: u16,

    /// Serve over TLS. Requires `tls`.
    pub https: bool,

    /// Certificate material for HTTPS.
    pub tls: Option<TlsConfig>,
}

impl ListenerConfig {
    /// Socket address built from `bind_address` and `port`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::Address(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            https: false,
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Request handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds. `0` disables the timeout.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Generate and propagate `x-request-id`.
    pub request_id: bool,

    /// Root directory for HTML error templates (`errors/<view>.html`).
    pub views_dir: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            max_body_size: 2 * 1024 * 1024, // 2MB
            request_id: true,
            views_dir: PathBuf::from("views"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
