//! Project setup: where the configuration lives and which path mappings apply.

use std::path::{Path, PathBuf};

use log::debug;
use pkgtrace_fs::{paths, FileSystem};
use pkgtrace_packages::{ConfigError, PathMappings, ProjectConfig, NODE_MODULES};

pub const TSCONFIG_FILE: &str = "tsconfig.json";

/// Everything a finder needs to know about the project being scanned.
#[derive(Debug)]
pub struct Project {
    pub base_path: PathBuf,
    pub config: ProjectConfig,
    pub path_mappings: Option<PathMappings>,
}

impl Project {
    /// Load the configuration and path mappings for `base_path`.
    ///
    /// Without an explicit `tsconfig`, a `tsconfig.json` in the project
    /// directory is used when there is one.
    pub fn load(fs: &dyn FileSystem, base_path: &Path, tsconfig: Option<&Path>) -> Result<Self, ConfigError> {
        let project_path = project_path_for(base_path);
        let config = ProjectConfig::load(fs, &project_path)?;

        let tsconfig = match tsconfig {
            Some(tsconfig) => Some(tsconfig.to_path_buf()),
            None => Some(project_path.join(TSCONFIG_FILE)).filter(|candidate| fs.exists(candidate)),
        };
        let path_mappings = match tsconfig {
            Some(tsconfig) => {
                debug!("Reading path mappings from {}", tsconfig.display());
                PathMappings::from_tsconfig(fs, &tsconfig)?
            }
            None => None,
        };

        Ok(Self {
            base_path: base_path.to_path_buf(),
            config,
            path_mappings,
        })
    }
}

/// The project directory for `path`: the parent of its outermost
/// `node_modules` ancestor, or `path` itself when it is not inside one.
pub fn project_path_for(path: &Path) -> PathBuf {
    path.ancestors()
        .filter(|ancestor| paths::basename(ancestor) == NODE_MODULES)
        .last()
        .map(paths::dirname)
        .unwrap_or_else(|| path.to_path_buf())
}
