//! Locating a module's `routes` and `middleware` directories.

use std::path::{Path, PathBuf};

use crate::config::ModuleConfig;
use crate::subapp::mount::MountKind;

/// Resolve `<module>/<directory>`.
///
/// An absolute `module_dir` is used as the module directory. Otherwise the
/// module lives at `<modules_root>/<module_id>`, with `modules_root`
/// resolved against the current directory.
pub fn find_directory_path_in_module(
    directory: &str,
    module_dir: Option<&Path>,
    module_id: &str,
    modules_root: &Path,
) -> PathBuf {
    let base = match module_dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        _ => std::path::absolute(modules_root)
            .unwrap_or_else(|_| modules_root.to_path_buf())
            .join(module_id),
    };
    base.join(directory)
}

/// Resolved locations of a module's mount directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLayout {
    pub routes: PathBuf,
    pub middleware: PathBuf,
}

impl ModuleLayout {
    pub fn resolve(config: &ModuleConfig) -> Self {
        let find = |directory| {
            find_directory_path_in_module(
                directory,
                config.module_dir.as_deref(),
                &config.module_id,
                &config.modules_root,
            )
        };
        Self {
            routes: find("routes"),
            middleware: find("middleware"),
        }
    }

    pub fn path(&self, kind: MountKind) -> &Path {
        match kind {
            MountKind::Middleware => &self.middleware,
            MountKind::Routes => &self.routes,
        }
    }

    /// The directory for `kind`, only if it exists on disk.
    pub fn existing(&self, kind: MountKind) -> Option<&Path> {
        let path = self.path(kind);
        path.is_dir().then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_module_dir_wins() {
        let dir = std::env::temp_dir().join("admin");
        let path = find_directory_path_in_module("routes", Some(&dir), "ignored", Path::new("./modules"));
        assert_eq!(path, dir.join("routes"));
    }

    #[test]
    fn relative_module_dir_falls_back_to_modules_root() {
        let path = find_directory_path_in_module(
            "middleware",
            Some(Path::new("relative/admin")),
            "admin",
            Path::new("./modules"),
        );
        assert!(path.is_absolute());
        assert!(path.ends_with("modules/admin/middleware"));
    }

    #[test]
    fn layout_reports_only_existing_directories() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("routes")).unwrap();

        let config = ModuleConfig {
            module_dir: Some(root.path().to_path_buf()),
            ..ModuleConfig::default()
        };
        let layout = ModuleLayout::resolve(&config);

        assert_eq!(layout.routes, root.path().join("routes"));
        assert_eq!(layout.existing(MountKind::Routes), Some(layout.routes.as_path()));
        assert_eq!(layout.existing(MountKind::Middleware), None);
    }
}
