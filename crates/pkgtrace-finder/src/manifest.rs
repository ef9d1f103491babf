//! Entry-point manifest
//!
//! A full walk of a large `node_modules` is slow, so its result is cached in
//! `node_modules/__pkgtrace_entry_points__.json`. The cache is only trusted
//! while the tool version, the project configuration and the lock file next
//! to `node_modules` are all unchanged.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use pkgtrace_deps::{DependencyInfo, EntryPointWithDependencies};
use pkgtrace_fs::{paths, FileSystem};
use pkgtrace_packages::{EntryPointInfo, ProjectConfig, NODE_MODULES, TOOL_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::context::RunContext;
use crate::error::FinderError;

/// File name of the manifest inside a `node_modules` directory.
pub const MANIFEST_FILE: &str = "__pkgtrace_entry_points__.json";

/// Lock files whose contents key the manifest, in lookup order.
const LOCK_FILES: [&str; 2] = ["yarn.lock", "package-lock.json"];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFile {
    tool_version: String,
    config_file_hash: String,
    lock_file_hash: String,
    entry_point_paths: Vec<ManifestRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestRecord {
    /// Relative to the manifest's directory.
    package_path: PathBuf,
    /// Relative to the manifest's directory.
    entry_point_path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    missing: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    deep_imports: Vec<PathBuf>,
}

/// Storage for walk results keyed by search root.
pub trait Manifest {
    /// Previously stored entry points for `base_path`, if still valid.
    fn read_entry_points_using_manifest(
        &self,
        ctx: &mut RunContext,
        base_path: &Path,
    ) -> Option<Vec<EntryPointWithDependencies>>;

    fn write_entry_point_manifest(
        &self,
        base_path: &Path,
        entry_points: &[EntryPointWithDependencies],
    ) -> Result<(), FinderError>;
}

pub struct EntryPointManifest<'a> {
    fs: &'a dyn FileSystem,
    config: &'a ProjectConfig,
}

impl<'a> EntryPointManifest<'a> {
    pub fn new(fs: &'a dyn FileSystem, config: &'a ProjectConfig) -> Self {
        Self { fs, config }
    }

    pub fn manifest_path(base_path: &Path) -> PathBuf {
        base_path.join(MANIFEST_FILE)
    }

    /// SHA-256 of the first lock file beside `base_path`.
    fn compute_lock_file_hash(&self, base_path: &Path) -> Result<Option<String>, FinderError> {
        let directory = paths::dirname(base_path);
        for lock_file in LOCK_FILES {
            let lock_file_path = directory.join(lock_file);
            if self.fs.exists(&lock_file_path) {
                let contents = self
                    .fs
                    .read_to_string(&lock_file_path)
                    .map_err(|e| FinderError::io(&lock_file_path, e))?;
                let mut hasher = Sha256::new();
                hasher.update(contents.as_bytes());
                return Ok(Some(format!("{:x}", hasher.finalize())));
            }
        }
        Ok(None)
    }

    fn try_read(
        &self,
        ctx: &mut RunContext,
        base_path: &Path,
    ) -> Result<Option<Vec<EntryPointWithDependencies>>, FinderError> {
        if paths::basename(base_path) != NODE_MODULES {
            return Ok(None);
        }
        let manifest_path = Self::manifest_path(base_path);
        if !self.fs.exists(&manifest_path) {
            return Ok(None);
        }
        let Some(lock_file_hash) = self.compute_lock_file_hash(base_path)? else {
            return Ok(None);
        };

        let contents = self
            .fs
            .read_to_string(&manifest_path)
            .map_err(|e| FinderError::io(&manifest_path, e))?;
        let manifest: ManifestFile = serde_json::from_str(&contents)?;
        if manifest.tool_version != TOOL_VERSION
            || manifest.config_file_hash != self.config.hash()
            || manifest.lock_file_hash != lock_file_hash
        {
            return Ok(None);
        }

        debug!(
            "Entry-point manifest found for {} so loading entry-point information directly.",
            base_path.display()
        );

        let mut entry_points = Vec::with_capacity(manifest.entry_point_paths.len());
        for record in manifest.entry_point_paths {
            let package_path = paths::resolve(base_path, &record.package_path);
            let entry_point_path = paths::resolve(base_path, &record.entry_point_path);
            let entry_point = match ctx.entry_point_info(self.fs, self.config, &package_path, &entry_point_path) {
                EntryPointInfo::Valid(entry_point) => entry_point,
                _ => {
                    return Err(FinderError::InvalidManifest {
                        path: manifest_path,
                        reason: format!(
                            "it contained an invalid pair of package paths: [{}, {}]",
                            record.package_path.display(),
                            record.entry_point_path.display()
                        ),
                    })
                }
            };
            entry_points.push(EntryPointWithDependencies {
                entry_point,
                dep_info: DependencyInfo {
                    dependencies: record.dependencies.into_iter().collect(),
                    missing: record.missing.into_iter().collect(),
                    deep_imports: record.deep_imports.into_iter().collect(),
                },
            });
        }
        Ok(Some(entry_points))
    }
}

impl Manifest for EntryPointManifest<'_> {
    fn read_entry_points_using_manifest(
        &self,
        ctx: &mut RunContext,
        base_path: &Path,
    ) -> Option<Vec<EntryPointWithDependencies>> {
        match self.try_read(ctx, base_path) {
            Ok(entry_points) => entry_points,
            Err(e) => {
                warn!("Unable to read the entry-point manifest for {}:\n{}", base_path.display(), e);
                None
            }
        }
    }

    fn write_entry_point_manifest(
        &self,
        base_path: &Path,
        entry_points: &[EntryPointWithDependencies],
    ) -> Result<(), FinderError> {
        if paths::basename(base_path) != NODE_MODULES {
            return Ok(());
        }
        let Some(lock_file_hash) = self.compute_lock_file_hash(base_path)? else {
            return Ok(());
        };

        let manifest = ManifestFile {
            tool_version: TOOL_VERSION.to_string(),
            config_file_hash: self.config.hash().to_string(),
            lock_file_hash,
            entry_point_paths: entry_points
                .iter()
                .map(|e| ManifestRecord {
                    package_path: paths::relative(base_path, &e.entry_point.package_path),
                    entry_point_path: paths::relative(base_path, &e.entry_point.path),
                    dependencies: e.dep_info.dependencies.iter().cloned().collect(),
                    missing: e.dep_info.missing.iter().cloned().collect(),
                    deep_imports: e.dep_info.deep_imports.iter().cloned().collect(),
                })
                .collect(),
        };

        let manifest_path = Self::manifest_path(base_path);
        let contents = serde_json::to_string(&manifest)?;
        self.fs
            .write(&manifest_path, &contents)
            .map_err(|e| FinderError::io(&manifest_path, e))
    }
}

/// A manifest that never reads, so every run walks and rewrites it.
pub struct InvalidatingManifest<'a> {
    inner: EntryPointManifest<'a>,
}

impl<'a> InvalidatingManifest<'a> {
    pub fn new(fs: &'a dyn FileSystem, config: &'a ProjectConfig) -> Self {
        Self {
            inner: EntryPointManifest::new(fs, config),
        }
    }
}

impl Manifest for InvalidatingManifest<'_> {
    fn read_entry_points_using_manifest(
        &self,
        _ctx: &mut RunContext,
        _base_path: &Path,
    ) -> Option<Vec<EntryPointWithDependencies>> {
        None
    }

    fn write_entry_point_manifest(
        &self,
        base_path: &Path,
        entry_points: &[EntryPointWithDependencies],
    ) -> Result<(), FinderError> {
        self.inner.write_entry_point_manifest(base_path, entry_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgtrace_deps::{DependencyResolver, EsmDependencyHost};
    use pkgtrace_fs::MemoryFileSystem;

    use crate::collector::EntryPointCollector;

    const ROOT: &str = "/proj/node_modules";

    fn fixture() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/yarn.lock", "lock v1");
        fs.add_file(
            "/proj/node_modules/lib/package.json",
            r#"{"name": "lib", "typings": "index.d.ts", "main": "index.js"}"#,
        );
        fs.add_file("/proj/node_modules/lib/index.js", "require('dep'); require('gone');");
        fs.add_file(
            "/proj/node_modules/dep/package.json",
            r#"{"name": "dep", "typings": "index.d.ts"}"#,
        );
        fs
    }

    fn walk(fs: &MemoryFileSystem, config: &ProjectConfig) -> Vec<EntryPointWithDependencies> {
        let resolver = DependencyResolver::new(EsmDependencyHost::new(fs, None));
        EntryPointCollector::new(fs, config, &resolver)
            .walk_directory_for_packages(&mut RunContext::new(), Path::new(ROOT))
            .unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let fs = fixture();
        let config = ProjectConfig::empty("/proj");
        let walked = walk(&fs, &config);
        let manifest = EntryPointManifest::new(&fs, &config);

        manifest.write_entry_point_manifest(Path::new(ROOT), &walked).unwrap();
        assert!(fs.exists(Path::new("/proj/node_modules/__pkgtrace_entry_points__.json")));

        let read = manifest
            .read_entry_points_using_manifest(&mut RunContext::new(), Path::new(ROOT))
            .unwrap();
        assert_eq!(read, walked);
    }

    #[test]
    fn test_lock_file_change_invalidates() {
        let fs = fixture();
        let config = ProjectConfig::empty("/proj");
        let manifest = EntryPointManifest::new(&fs, &config);
        manifest.write_entry_point_manifest(Path::new(ROOT), &walk(&fs, &config)).unwrap();

        fs.add_file("/proj/yarn.lock", "lock v2");
        assert!(manifest
            .read_entry_points_using_manifest(&mut RunContext::new(), Path::new(ROOT))
            .is_none());
    }

    #[test]
    fn test_config_change_invalidates() {
        let fs = fixture();
        let config = ProjectConfig::empty("/proj");
        EntryPointManifest::new(&fs, &config)
            .write_entry_point_manifest(Path::new(ROOT), &walk(&fs, &config))
            .unwrap();

        let changed = ProjectConfig::from_source(Path::new("/proj"), r#"{"packages": {}}"#).unwrap();
        assert!(EntryPointManifest::new(&fs, &changed)
            .read_entry_points_using_manifest(&mut RunContext::new(), Path::new(ROOT))
            .is_none());
    }

    #[test]
    fn test_no_lock_file_means_no_manifest() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/node_modules/lib/package.json", r#"{"typings": "x.d.ts"}"#);
        let config = ProjectConfig::empty("/proj");
        let manifest = EntryPointManifest::new(&fs, &config);

        manifest.write_entry_point_manifest(Path::new(ROOT), &walk(&fs, &config)).unwrap();
        assert!(!fs.exists(Path::new("/proj/node_modules/__pkgtrace_entry_points__.json")));
        assert!(manifest
            .read_entry_points_using_manifest(&mut RunContext::new(), Path::new(ROOT))
            .is_none());
    }

    #[test]
    fn test_only_node_modules_roots_get_a_manifest() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/yarn.lock", "");
        fs.add_dir("/proj");
        let config = ProjectConfig::empty("/proj");
        EntryPointManifest::new(&fs, &config)
            .write_entry_point_manifest(Path::new("/proj"), &[])
            .unwrap();
        assert!(!fs.exists(Path::new("/proj/__pkgtrace_entry_points__.json")));
    }

    #[test]
    fn test_stale_entry_makes_manifest_invalid() {
        let fs = fixture();
        let config = ProjectConfig::empty("/proj");
        let manifest = EntryPointManifest::new(&fs, &config);
        manifest.write_entry_point_manifest(Path::new(ROOT), &walk(&fs, &config)).unwrap();

        fs.add_file("/proj/node_modules/dep/package.json", "{ now broken");
        assert!(manifest
            .read_entry_points_using_manifest(&mut RunContext::new(), Path::new(ROOT))
            .is_none());
    }

    #[test]
    fn test_invalidating_manifest_never_reads() {
        let fs = fixture();
        let config = ProjectConfig::empty("/proj");
        let manifest = InvalidatingManifest::new(&fs, &config);
        manifest.write_entry_point_manifest(Path::new(ROOT), &walk(&fs, &config)).unwrap();

        assert!(fs.exists(Path::new("/proj/node_modules/__pkgtrace_entry_points__.json")));
        assert!(manifest
            .read_entry_points_using_manifest(&mut RunContext::new(), Path::new(ROOT))
            .is_none());
    }
}
