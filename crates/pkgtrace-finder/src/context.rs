//! Per-run memoization

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pkgtrace_deps::{DependencyResolver, EntryPointWithDependencies};
use pkgtrace_fs::FileSystem;
use pkgtrace_packages::{get_entry_point_info, EntryPoint, EntryPointInfo, ProjectConfig};

/// Caches classifications and dependency information for one run.
///
/// Both caches are keyed by entry-point path. A classification is only
/// reused when it was made against the same package path.
#[derive(Debug, Default)]
pub struct RunContext {
    infos: HashMap<PathBuf, (PathBuf, EntryPointInfo)>,
    with_dependencies: HashMap<PathBuf, EntryPointWithDependencies>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_point_info(
        &mut self,
        fs: &dyn FileSystem,
        config: &ProjectConfig,
        package_path: &Path,
        entry_point_path: &Path,
    ) -> EntryPointInfo {
        if let Some((cached_package, info)) = self.infos.get(entry_point_path) {
            if cached_package == package_path {
                return info.clone();
            }
        }
        let info = get_entry_point_info(fs, config, package_path, entry_point_path);
        self.infos.insert(
            entry_point_path.to_path_buf(),
            (package_path.to_path_buf(), info.clone()),
        );
        info
    }

    pub fn entry_point_with_dependencies(
        &mut self,
        resolver: &DependencyResolver<'_>,
        entry_point: EntryPoint,
    ) -> EntryPointWithDependencies {
        if let Some(cached) = self.with_dependencies.get(&entry_point.path) {
            return cached.clone();
        }
        let path = entry_point.path.clone();
        let resolved = resolver.get_entry_point_with_dependencies(entry_point);
        self.with_dependencies.insert(path, resolved.clone());
        resolved
    }

    /// Number of distinct paths classified so far.
    pub fn classified(&self) -> usize {
        self.infos.len()
    }
}
