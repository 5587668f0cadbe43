//! Registration of a module's middleware and routes.
//!
//! A sub-app lists its mounts explicitly; the loader runs every
//! [`MountKind::Middleware`] mount before any [`MountKind::Routes`] mount.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::BoxError;
use crate::http::ServerInstance;
use crate::subapp::context::ModuleContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountKind {
    Middleware,
    Routes,
}

impl MountKind {
    /// Directory name inside the module.
    pub fn directory_name(self) -> &'static str {
        match self {
            MountKind::Middleware => "middleware",
            MountKind::Routes => "routes",
        }
    }
}

impl fmt::Display for MountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.directory_name())
    }
}

/// What a mount gets to work with.
pub struct MountContext<'a> {
    pub server: &'a ServerInstance,
    pub config: &'a ServerConfig,
    pub context: &'a Arc<dyn ModuleContext>,
    /// The module's directory for this mount kind, when it exists on disk.
    pub directory: Option<&'a Path>,
}

pub trait Mount: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> MountKind;

    fn mount(&self, cx: MountContext<'_>) -> Result<(), BoxError>;
}

/// A [`Mount`] backed by a closure. Built by [`mount_fn`].
pub struct FnMount<F> {
    name: String,
    kind: MountKind,
    f: F,
}

pub fn mount_fn<F>(name: impl Into<String>, kind: MountKind, f: F) -> FnMount<F>
where
    F: Fn(MountContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    FnMount {
        name: name.into(),
        kind,
        f,
    }
}

impl<F> Mount for FnMount<F>
where
    F: Fn(MountContext<'_>) -> Result<(), BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MountKind {
        self.kind
    }

    fn mount(&self, cx: MountContext<'_>) -> Result<(), BoxError> {
        (self.f)(cx)
    }
}

impl<F> fmt::Debug for FnMount<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMount")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}
