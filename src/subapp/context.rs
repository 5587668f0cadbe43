//! The application context a sub-app is initialized against.
//!
//! Dependency resolution and lifecycle events belong to the host
//! application; the loader only needs the two calls on [`ModuleContext`].

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

/// Emitted by the host once every module has finished initializing.
pub const MODULES_RESOLVED: &str = "modules.resolved";

pub type EventHandler = Box<dyn FnOnce() + Send>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("dependency '{0}' is not available")]
    Missing(String),

    #[error("failed to resolve dependency '{name}': {reason}")]
    Failed { name: String, reason: String },
}

#[async_trait]
pub trait ModuleContext: Send + Sync {
    /// Make sure `dependencies` are loaded. When `optional` is set, missing
    /// dependencies are not an error.
    async fn resolve(&self, dependencies: &[String], optional: bool) -> Result<(), ResolveError>;

    /// Run `handler` the first time `event` fires.
    fn once(&self, event: &str, handler: EventHandler);
}

/// In-process context with a fixed set of provided dependencies.
#[derive(Default)]
pub struct StaticContext {
    provided: Mutex<HashSet<String>>,
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl StaticContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provide(&self, name: impl Into<String>) -> &Self {
        lock(&self.provided).insert(name.into());
        self
    }

    pub fn is_provided(&self, name: &str) -> bool {
        lock(&self.provided).contains(name)
    }

    /// Fire `event`, running and discarding its pending handlers.
    /// Returns how many ran.
    pub fn emit(&self, event: &str) -> usize {
        let handlers = lock(&self.handlers).remove(event).unwrap_or_default();
        let count = handlers.len();
        for handler in handlers {
            handler();
        }
        tracing::debug!(event, handlers = count, "Event emitted");
        count
    }
}

#[async_trait]
impl ModuleContext for StaticContext {
    async fn resolve(&self, dependencies: &[String], optional: bool) -> Result<(), ResolveError> {
        let provided = lock(&self.provided);
        for name in dependencies {
            if provided.contains(name) {
                continue;
            }
            if !optional {
                return Err(ResolveError::Missing(name.clone()));
            }
            tracing::warn!(dependency = %name, "Optional dependency not available");
        }
        Ok(())
    }

    fn once(&self, event: &str, handler: EventHandler) {
        lock(&self.handlers)
            .entry(event.to_owned())
            .or_default()
            .push(handler);
    }
}

impl std::fmt::Debug for StaticContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticContext")
            .field("provided", &*lock(&self.provided))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
