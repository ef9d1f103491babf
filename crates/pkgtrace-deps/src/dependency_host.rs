//! Dependency host
//!
//! Collects the dependencies of an entry point by scanning its bundle and
//! every file the bundle reaches through relative imports.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use log::debug;
use pkgtrace_fs::{paths, FileSystem};
use pkgtrace_packages::{EntryPoint, PathMappings};

use crate::import_scanner::ImportScanner;
use crate::module_resolver::{is_builtin, resolve_file_with_postfixes, ModuleResolver, ResolvedModule, RELATIVE_EXTENSIONS};

/// Dependencies found for one entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyInfo {
    /// Paths of the entry points this one imports.
    pub dependencies: BTreeSet<PathBuf>,
    /// Specifiers that could not be resolved.
    pub missing: BTreeSet<String>,
    /// Imports that reach inside another package without hitting an entry point.
    pub deep_imports: BTreeSet<PathBuf>,
}

/// Source of an entry point's dependency information.
pub trait DependencyHost {
    fn collect_dependencies(&self, entry_point: &EntryPoint) -> DependencyInfo;
}

/// Follows ES module and CommonJS imports in JavaScript bundles.
pub struct EsmDependencyHost<'a> {
    fs: &'a dyn FileSystem,
    resolver: ModuleResolver<'a>,
}

impl<'a> EsmDependencyHost<'a> {
    pub fn new(fs: &'a dyn FileSystem, path_mappings: Option<&PathMappings>) -> Self {
        Self {
            fs,
            resolver: ModuleResolver::new(fs, path_mappings),
        }
    }

    /// Collect dependencies reachable from the file at `entry_file`.
    pub fn collect_from_file(&self, entry_file: &Path, info: &mut DependencyInfo) {
        let Some(resolved) = resolve_file_with_postfixes(self.fs, entry_file, &RELATIVE_EXTENSIONS) else {
            debug!("No bundle found at {}", entry_file.display());
            return;
        };

        let mut seen = HashSet::new();
        seen.insert(resolved.clone());
        let mut pending = vec![resolved];

        while let Some(file) = pending.pop() {
            let contents = match self.fs.read_to_string(&file) {
                Ok(contents) => contents,
                Err(e) => {
                    debug!("Could not read {}: {}", file.display(), e);
                    continue;
                }
            };
            if !ImportScanner::has_import_or_require(&contents) {
                continue;
            }

            for specifier in ImportScanner::scan(&contents) {
                match self.resolver.resolve_module_import(&specifier, &file) {
                    Some(ResolvedModule::Relative(internal)) => {
                        if seen.insert(internal.clone()) {
                            pending.push(internal);
                        }
                    }
                    Some(ResolvedModule::External(entry_point_path)) => {
                        info.dependencies.insert(entry_point_path);
                    }
                    Some(ResolvedModule::DeepImport(import_path)) => {
                        info.deep_imports.insert(import_path);
                    }
                    None if is_builtin(&specifier) => {}
                    None => {
                        info.missing.insert(specifier);
                    }
                }
            }
        }
    }
}

impl DependencyHost for EsmDependencyHost<'_> {
    fn collect_dependencies(&self, entry_point: &EntryPoint) -> DependencyInfo {
        let mut info = DependencyInfo::default();
        match entry_point.declared_formats().next() {
            Some((property, bundle)) => {
                debug!("Scanning '{}' of {}", property, entry_point.name);
                self.collect_from_file(&paths::resolve(&entry_point.path, bundle), &mut info);
            }
            None => debug!("{} declares no bundle formats", entry_point.name),
        }
        // An entry point never depends on itself.
        info.dependencies.remove(&entry_point.path);
        info
    }
}
