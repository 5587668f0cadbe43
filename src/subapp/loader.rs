//! Sub-app bootstrap: resolve dependencies, start the server, run mounts.
//!
//! ```text
//! init(context, config)
//!     → resolve module layout (routes/, middleware/)
//!     → context.resolve(dependencies)
//!     → ServerInstance::create + listen
//!     → middleware mounts → routes mounts
//!     → listening ServerInstance
//! ```

use std::sync::Arc;

use axum::Extension;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::http::{CreateOptions, ServerInstance, ServerOptionsOverrides};
use crate::subapp::context::{ModuleContext, MODULES_RESOLVED};
use crate::subapp::mount::{Mount, MountContext, MountKind};
use crate::subapp::paths::ModuleLayout;

/// A module's HTTP server, described by its mounts.
#[derive(Default)]
pub struct Subapp {
    mounts: Vec<Box<dyn Mount>>,
    server_options: ServerOptionsOverrides,
}

impl Subapp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mount. Mounts of the same kind run in registration order.
    pub fn mount(mut self, mount: impl Mount + 'static) -> Self {
        self.mounts.push(Box::new(mount));
        self
    }

    /// Error hooks for the created server.
    pub fn server_options(mut self, overrides: ServerOptionsOverrides) -> Self {
        self.server_options = overrides;
        self
    }

    /// Bring the module's server up. Resolves once the server is listening
    /// and every mount has run.
    ///
    /// Every registered mount runs, whether or not its `routes` or
    /// `middleware` directory exists; a missing directory only makes
    /// [`MountContext::directory`] `None`.
    pub async fn init(
        &self,
        context: Arc<dyn ModuleContext>,
        config: &ServerConfig,
    ) -> Result<ServerInstance, ServerError> {
        let span = tracing::info_span!("module", id = %config.module.module_id);
        self.run(context, config).instrument(span).await
    }

    async fn run(
        &self,
        context: Arc<dyn ModuleContext>,
        config: &ServerConfig,
    ) -> Result<ServerInstance, ServerError> {
        let module = &config.module;
        let layout = ModuleLayout::resolve(module);

        tracing::info!("Initializing module {}", module.module_id);
        tracing::info!(
            routes = %layout.routes.display(),
            middleware = %layout.middleware.display(),
            "Module layout resolved"
        );

        let base_url = config.base_url();
        context.once(
            MODULES_RESOLVED,
            Box::new(move || tracing::info!(base_url = %base_url, "Server is running at {}", base_url)),
        );

        context
            .resolve(&module.dependencies, module.optional_dependencies)
            .await?;
        tracing::info!(dependencies = module.dependencies.len(), "Dependencies resolved");

        let addr = config.listener.socket_addr()?;
        let options =
            CreateOptions::from_config(config).with_server_options(self.server_options.clone());
        let server = ServerInstance::create(options).await?;

        // Every route, including ones mounted below, can extract the context.
        server.use_layer(Extension(context.clone()));

        if let Err(e) = server.listen(addr).await {
            tracing::error!(error = %e, "Failed to start server");
            return Err(e);
        }

        for kind in [MountKind::Middleware, MountKind::Routes] {
            let directory = layout.existing(kind);
            for mount in self.mounts.iter().filter(|mount| mount.kind() == kind) {
                tracing::debug!(
                    mount = mount.name(),
                    kind = %kind,
                    directory = ?directory,
                    "Running mount"
                );

                let cx = MountContext {
                    server: &server,
                    config,
                    context: &context,
                    directory,
                };
                if let Err(source) = mount.mount(cx) {
                    tracing::error!(mount = mount.name(), error = %source, "Mount failed");
                    server.shutdown().await;
                    return Err(ServerError::Mount {
                        name: mount.name().to_owned(),
                        source,
                    });
                }
            }
        }

        Ok(server)
    }
}

impl std::fmt::Debug for Subapp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.mounts.iter().map(|mount| mount.name()).collect();
        f.debug_struct("Subapp")
            .field("mounts", &names)
            .field("server_options", &self.server_options)
            .finish()
    }
}

/// Free-function form of [`Subapp::init`].
pub async fn initialize_subapp(
    subapp: &Subapp,
    context: Arc<dyn ModuleContext>,
    config: &ServerConfig,
) -> Result<ServerInstance, ServerError> {
    subapp.init(context, config).await
}
