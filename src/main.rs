//! Sub-app HTTP server.
//!
//! ```text
//!   CLI flags ──┐
//!   TOML file ──┴─▶ ServerConfig ─▶ Subapp::init(StaticContext)
//!                                      │
//!                                      ├─ resolve dependencies
//!                                      ├─ create + listen (plain / TLS)
//!                                      ├─ middleware mounts
//!                                      └─ routes mounts (/status)
//!
//!   modules.resolved ─▶ "Server is running at ..."
//!   SIGINT / SIGTERM ─▶ graceful shutdown
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Json;
use clap::Parser;
use serde::Serialize;

use subapp_server::config::{load_config, validate_config, ConfigError, ConfigOverrides, ServerConfig};
use subapp_server::lifecycle::{wait_for_signal, Shutdown};
use subapp_server::observability::init_logging;
use subapp_server::subapp::{mount_fn, MountKind, StaticContext, Subapp, MODULES_RESOLVED};

#[derive(Parser)]
#[command(name = "subapp-server")]
#[command(about = "Module HTTP server", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,

    /// Absolute module directory.
    #[arg(long)]
    module_dir: Option<PathBuf>,

    /// trace, debug, info, warn or error.
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Serialize)]
struct SystemStatus {
    version: &'static str,
    status: &'static str,
}

async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    let config = config.with_overrides(ConfigOverrides {
        bind_address: cli.bind,
        port: cli.port,
        module_dir: cli.module_dir,
        log_level: cli.log_level,
    });
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability);
    tracing::info!("subapp-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        module_id = %config.module.module_id,
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        https = config.listener.https,
        "Configuration loaded"
    );

    let subapp = Subapp::new().mount(mount_fn("status", MountKind::Routes, |cx| {
        if let Some(router) = cx.server.mount_router("/status") {
            router.route("/", get(get_status));
        }
        Ok(())
    }));

    let context = Arc::new(StaticContext::new());
    let server = subapp.init(context.clone(), &config).await?;
    context.emit(MODULES_RESOLVED);

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));
    shutdown.wait().await;

    server.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
