//! Sub-app loader.
//!
//! Turns a module (its config plus a list of mounts) into a listening
//! [`ServerInstance`](crate::http::ServerInstance).

pub mod context;
pub mod loader;
pub mod mount;
pub mod paths;

pub use context::{EventHandler, ModuleContext, ResolveError, StaticContext, MODULES_RESOLVED};
pub use loader::{initialize_subapp, Subapp};
pub use mount::{mount_fn, FnMount, Mount, MountContext, MountKind};
pub use paths::{find_directory_path_in_module, ModuleLayout};
