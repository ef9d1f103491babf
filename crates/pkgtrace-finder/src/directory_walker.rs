//! Directory-walker finder
//!
//! Finds every entry point under every search root, reusing a stored
//! manifest for a root when one is still valid.

use std::path::{Path, PathBuf};

use log::debug;
use pkgtrace_deps::{DependencyResolver, EntryPointWithDependencies, SortedEntryPoints};
use pkgtrace_fs::FileSystem;
use pkgtrace_packages::{PathMappings, ProjectConfig};

use crate::collector::EntryPointCollector;
use crate::context::RunContext;
use crate::error::FinderError;
use crate::manifest::Manifest;
use crate::search_roots::get_base_paths;

pub struct DirectoryWalkerFinder<'a> {
    resolver: &'a DependencyResolver<'a>,
    manifest: &'a dyn Manifest,
    collector: EntryPointCollector<'a>,
    base_paths: Vec<PathBuf>,
}

impl<'a> DirectoryWalkerFinder<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        config: &'a ProjectConfig,
        resolver: &'a DependencyResolver<'a>,
        manifest: &'a dyn Manifest,
        source_directory: &Path,
        path_mappings: Option<&PathMappings>,
    ) -> Self {
        Self {
            resolver,
            manifest,
            collector: EntryPointCollector::new(fs, config, resolver),
            base_paths: get_base_paths(fs, source_directory, path_mappings),
        }
    }

    pub fn base_paths(&self) -> &[PathBuf] {
        &self.base_paths
    }

    /// Find and sort the entry points of every search root.
    pub fn find_entry_points(&self) -> Result<SortedEntryPoints, FinderError> {
        let mut ctx = RunContext::new();
        let mut unsorted = Vec::new();

        for base_path in &self.base_paths {
            let entry_points = match self.manifest.read_entry_points_using_manifest(&mut ctx, base_path) {
                Some(entry_points) => entry_points,
                None => self.walk_base_path_for_packages(&mut ctx, base_path)?,
            };
            unsorted.extend(entry_points);
        }

        debug!("Sorting {} entry points", unsorted.len());
        Ok(self.resolver.sort_entry_points_by_dependency(unsorted))
    }

    fn walk_base_path_for_packages(
        &self,
        ctx: &mut RunContext,
        base_path: &Path,
    ) -> Result<Vec<EntryPointWithDependencies>, FinderError> {
        debug!("No manifest found for {} so walking the directories for entry points.", base_path.display());
        let entry_points = self.collector.walk_directory_for_packages(ctx, base_path)?;
        debug!(
            "Walking {} found {} entry points ({} paths classified).",
            base_path.display(),
            entry_points.len(),
            ctx.classified()
        );
        self.manifest.write_entry_point_manifest(base_path, &entry_points)?;
        Ok(entry_points)
    }
}
