//! Project configuration
//!
//! Configuration is read from `pkgtrace.config.json` at the project root and,
//! as a fallback, from a file of the same name inside each package. It lets a
//! project ignore entry points, patch broken descriptors and relax missing
//! dependency checks without editing `node_modules`.
//!
//! ```json
//! {
//!   "packages": {
//!     "some-lib": {
//!       "entryPoints": {
//!         "./testing": { "ignore": true },
//!         ".": { "override": { "typings": "./index.d.ts" } }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::warn;
use pkgtrace_fs::{paths, FileSystem};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// File name of both project and package level configuration.
pub const CONFIG_FILE: &str = "pkgtrace.config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Per entry-point configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPointConfig {
    #[serde(default)]
    pub ignore: bool,
    /// Keys merged over the entry point's package.json.
    #[serde(default, rename = "override")]
    pub overrides: Option<Value>,
    #[serde(default)]
    pub ignore_missing_dependencies: bool,
    #[serde(default)]
    pub generate_deep_reexports: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPackageConfig {
    #[serde(default)]
    entry_points: BTreeMap<String, EntryPointConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfigFile {
    #[serde(default)]
    packages: BTreeMap<String, RawPackageConfig>,
}

/// Configuration of one package, keyed by absolute entry-point path.
#[derive(Debug, Clone, Default)]
pub struct PackageConfig {
    pub entry_points: HashMap<PathBuf, EntryPointConfig>,
}

impl PackageConfig {
    fn resolve(raw: &RawPackageConfig, package_path: &Path) -> Self {
        let entry_points = raw
            .entry_points
            .iter()
            .map(|(relative, config)| (paths::resolve(package_path, relative), config.clone()))
            .collect();
        Self { entry_points }
    }

    pub fn entry_point(&self, entry_point_path: &Path) -> Option<&EntryPointConfig> {
        self.entry_points.get(entry_point_path)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    project_path: PathBuf,
    packages: BTreeMap<String, RawPackageConfig>,
    hash: String,
}

fn hash_contents(contents: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl ProjectConfig {
    /// A configuration with no package entries.
    pub fn empty(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            packages: BTreeMap::new(),
            hash: hash_contents(""),
        }
    }

    /// Load `pkgtrace.config.json` from `project_path`, if present.
    pub fn load(fs: &dyn FileSystem, project_path: &Path) -> Result<Self, ConfigError> {
        let config_path = project_path.join(CONFIG_FILE);
        if !fs.exists(&config_path) {
            return Ok(Self::empty(project_path));
        }
        let contents = fs.read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        Self::from_source(project_path, &contents).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })
    }

    /// Build a configuration from the contents of a config file.
    pub fn from_source(project_path: &Path, contents: &str) -> Result<Self, serde_json::Error> {
        let raw: RawConfigFile = serde_json::from_str(contents)?;
        Ok(Self {
            project_path: project_path.to_path_buf(),
            packages: raw.packages,
            hash: hash_contents(contents),
        })
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// SHA-256 of the configuration source, used to invalidate manifests.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Configuration for the package `package_name` installed at `package_path`.
    ///
    /// Project level entries win; otherwise a config file shipped inside the
    /// package is consulted. A broken package level file is reported and
    /// treated as empty.
    pub fn get_package_config(
        &self,
        fs: &dyn FileSystem,
        package_name: &str,
        package_path: &Path,
    ) -> PackageConfig {
        if let Some(raw) = self.packages.get(package_name) {
            return PackageConfig::resolve(raw, package_path);
        }

        let package_config_path = package_path.join(CONFIG_FILE);
        if !fs.exists(&package_config_path) {
            return PackageConfig::default();
        }
        let parsed = fs
            .read_to_string(&package_config_path)
            .map_err(|e| e.to_string())
            .and_then(|contents| {
                serde_json::from_str::<RawPackageConfig>(&contents).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(raw) => PackageConfig::resolve(&raw, package_path),
            Err(e) => {
                warn!(
                    "Ignoring package configuration at {}: {}",
                    package_config_path.display(),
                    e
                );
                PackageConfig::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgtrace_fs::MemoryFileSystem;

    #[test]
    fn test_missing_config_is_empty() {
        let fs = MemoryFileSystem::new();
        let config = ProjectConfig::load(&fs, Path::new("/project")).unwrap();
        let package = config.get_package_config(&fs, "lib", Path::new("/project/node_modules/lib"));
        assert!(package.entry_points.is_empty());
        assert_eq!(config.hash(), ProjectConfig::empty("/other").hash());
    }

    #[test]
    fn test_project_level_entry_points_are_resolved() {
        let fs = MemoryFileSystem::new();
        fs.add_file(
            "/project/pkgtrace.config.json",
            r#"{"packages": {"lib": {"entryPoints": {"./testing": {"ignore": true}, ".": {"ignoreMissingDependencies": true}}}}}"#,
        );
        let config = ProjectConfig::load(&fs, Path::new("/project")).unwrap();
        let package = config.get_package_config(&fs, "lib", Path::new("/project/node_modules/lib"));

        let testing = package
            .entry_point(Path::new("/project/node_modules/lib/testing"))
            .unwrap();
        assert!(testing.ignore);
        let primary = package.entry_point(Path::new("/project/node_modules/lib")).unwrap();
        assert!(primary.ignore_missing_dependencies);
        assert!(!primary.ignore);
    }

    #[test]
    fn test_package_level_config_is_a_fallback() {
        let fs = MemoryFileSystem::new();
        fs.add_file(
            "/project/node_modules/lib/pkgtrace.config.json",
            r#"{"entryPoints": {"./sub": {"override": {"typings": "./sub.d.ts"}}}}"#,
        );
        let config = ProjectConfig::empty("/project");
        let package = config.get_package_config(&fs, "lib", Path::new("/project/node_modules/lib"));
        let sub = package
            .entry_point(Path::new("/project/node_modules/lib/sub"))
            .unwrap();
        assert_eq!(sub.overrides, Some(serde_json::json!({"typings": "./sub.d.ts"})));
    }

    #[test]
    fn test_broken_package_config_is_ignored() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/project/node_modules/lib/pkgtrace.config.json", "{");
        let config = ProjectConfig::empty("/project");
        let package = config.get_package_config(&fs, "lib", Path::new("/project/node_modules/lib"));
        assert!(package.entry_points.is_empty());
    }

    #[test]
    fn test_invalid_project_config_is_an_error() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/project/pkgtrace.config.json", r#"{"packages": 3}"#);
        assert!(matches!(
            ProjectConfig::load(&fs, Path::new("/project")),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_hash_changes_with_contents() {
        let a = ProjectConfig::from_source(Path::new("/p"), r#"{"packages": {}}"#).unwrap();
        let b = ProjectConfig::from_source(Path::new("/p"), r#"{"packages": {"x": {}}}"#).unwrap();
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
    }
}
