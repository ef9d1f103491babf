//! Targeted entry-point finder
//!
//! Finds only the entry points reachable from one target entry point. This is
//! much cheaper than walking every search root and is what on-demand callers
//! use.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use pkgtrace_deps::{DependencyResolver, EntryPointWithDependencies, SortedEntryPoints};
use pkgtrace_fs::{paths, FileSystem};
use pkgtrace_packages::{FormatProperty, PathMappings, ProjectConfig, NODE_MODULES, PACKAGE_JSON};

use crate::context::RunContext;
use crate::error::FinderError;
use crate::search_roots::get_base_paths;
use crate::tracing::{trace, TracingStrategy};

pub struct TargetedEntryPointFinder<'a> {
    fs: &'a dyn FileSystem,
    config: &'a ProjectConfig,
    resolver: &'a DependencyResolver<'a>,
    base_path: PathBuf,
    path_mappings: Option<&'a PathMappings>,
    target_path: PathBuf,
    // Computed on first use; mapping-derived roots are only needed for
    // entry points outside the primary root.
    base_paths: OnceCell<Vec<PathBuf>>,
}

impl<'a> TargetedEntryPointFinder<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        config: &'a ProjectConfig,
        resolver: &'a DependencyResolver<'a>,
        base_path: impl Into<PathBuf>,
        path_mappings: Option<&'a PathMappings>,
        target_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            config,
            resolver,
            base_path: base_path.into(),
            path_mappings,
            target_path: target_path.into(),
            base_paths: OnceCell::new(),
        }
    }

    /// Find the target and its transitive dependencies, dependencies first.
    ///
    /// Fails if the target itself has missing dependencies.
    pub fn find_entry_points(&self) -> Result<SortedEntryPoints, FinderError> {
        let mut ctx = RunContext::new();
        let sorted = trace(self, &mut ctx, self.resolver);
        if let Some(invalid) = sorted.find_invalid(&self.target_path) {
            return Err(FinderError::MissingTargetDependencies {
                name: invalid.entry_point.name.clone(),
                missing: invalid.missing_dependencies.clone(),
            });
        }
        Ok(sorted)
    }

    /// Whether the target still has a format to process.
    ///
    /// Only `properties` the target declares are considered. With
    /// `compile_all_formats` every one of them must be processed already;
    /// otherwise a single processed format is enough.
    pub fn target_needs_processing_or_cleaning(
        &self,
        properties: &[FormatProperty],
        compile_all_formats: bool,
    ) -> bool {
        let mut ctx = RunContext::new();
        let Some(target) = self.resolve_one(&mut ctx, &self.target_path) else {
            return false;
        };
        let entry_point = &target.entry_point;
        for &property in properties {
            if entry_point.package_json.format_path(property).is_none() {
                continue;
            }
            if !entry_point.is_format_processed(property) {
                return true;
            }
            if !compile_all_formats {
                return false;
            }
        }
        false
    }

    fn base_paths(&self) -> &[PathBuf] {
        self.base_paths
            .get_or_init(|| get_base_paths(self.fs, &self.base_path, self.path_mappings))
    }

    /// Infer the root of the package that owns `entry_point_path`.
    pub fn compute_package_path(&self, entry_point_path: &Path) -> PathBuf {
        // The primary root first, to avoid computing the mapped roots at all.
        if paths::is_path_contained_by(&self.base_path, entry_point_path) {
            if let Some(package_path) = self.package_path_from_containing_path(entry_point_path, &self.base_path) {
                return package_path;
            }
        }

        for base_path in self.base_paths() {
            if paths::is_path_contained_by(base_path, entry_point_path) {
                if let Some(package_path) = self.package_path_from_containing_path(entry_point_path, base_path) {
                    return package_path;
                }
                // Search roots never nest, so no later root can contain the path.
                break;
            }
        }

        self.package_path_from_nearest_node_modules(entry_point_path)
    }

    fn package_path_from_containing_path(&self, entry_point_path: &Path, containing_path: &Path) -> Option<PathBuf> {
        let segments = paths::split_path(&paths::relative(containing_path, entry_point_path));
        let mut package_path = containing_path.to_path_buf();

        let remaining = match segments.iter().rposition(|s| s == NODE_MODULES) {
            // Path-mapped entry points often have the root as their package.
            None => {
                if self.fs.exists(&package_path.join(PACKAGE_JSON)) {
                    return Some(package_path);
                }
                &segments[..]
            }
            // Start below the deepest nested cache between root and path.
            Some(index) => {
                for segment in &segments[..=index] {
                    package_path.push(segment);
                }
                &segments[index + 1..]
            }
        };

        for segment in remaining {
            package_path.push(segment);
            if self.fs.exists(&package_path.join(PACKAGE_JSON)) {
                return Some(package_path);
            }
        }
        None
    }

    fn package_path_from_nearest_node_modules(&self, entry_point_path: &Path) -> PathBuf {
        let mut package_path = entry_point_path.to_path_buf();
        let mut scoped_package_path = package_path.clone();
        let mut container_path = paths::dirname(&package_path);
        while !paths::is_root(&container_path) && paths::basename(&container_path) != NODE_MODULES {
            scoped_package_path = package_path;
            package_path = container_path;
            container_path = paths::dirname(&package_path);
        }

        if self.fs.exists(&package_path.join(PACKAGE_JSON)) {
            package_path
        } else if paths::basename(&package_path).starts_with('@')
            && self.fs.exists(&scoped_package_path.join(PACKAGE_JSON))
        {
            scoped_package_path
        } else {
            // Nothing better: treat the entry point as a primary entry point.
            entry_point_path.to_path_buf()
        }
    }
}

impl TracingStrategy for TargetedEntryPointFinder<'_> {
    fn initial_paths(&self) -> Vec<PathBuf> {
        vec![self.target_path.clone()]
    }

    fn resolve_one(&self, ctx: &mut RunContext, path: &Path) -> Option<EntryPointWithDependencies> {
        let package_path = self.compute_package_path(path);
        let entry_point = ctx
            .entry_point_info(self.fs, self.config, &package_path, path)
            .as_entry_point()
            .cloned()?;
        Some(ctx.entry_point_with_dependencies(self.resolver, entry_point))
    }
}
