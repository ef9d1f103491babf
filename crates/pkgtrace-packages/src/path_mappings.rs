//! Path-mapping aliases (`compilerOptions.baseUrl` + `compilerOptions.paths`)

use std::path::{Path, PathBuf};

use pkgtrace_fs::{paths, FileSystem};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ConfigError;

/// Aliases that locate modules outside the dependency-cache hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMappings {
    /// Absolute directory every template is resolved against.
    pub base_url: PathBuf,
    /// `alias pattern -> [target template, ...]`, in declared order.
    pub paths: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerOptions {
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    paths: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsConfig {
    #[serde(default)]
    compiler_options: CompilerOptions,
}

impl PathMappings {
    pub fn new(base_url: impl Into<PathBuf>, paths: Vec<(String, Vec<String>)>) -> Self {
        Self {
            base_url: base_url.into(),
            paths,
        }
    }

    /// Read mappings from a `tsconfig.json`.
    ///
    /// Returns `None` when the file declares no `paths`. A missing `baseUrl`
    /// defaults to the directory holding the tsconfig.
    pub fn from_tsconfig(fs: &dyn FileSystem, tsconfig_path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = fs.read_to_string(tsconfig_path).map_err(|source| ConfigError::Io {
            path: tsconfig_path.to_path_buf(),
            source,
        })?;
        let tsconfig: TsConfig = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: tsconfig_path.to_path_buf(),
            source,
        })?;

        let Some(raw_paths) = tsconfig.compiler_options.paths else {
            return Ok(None);
        };

        let tsconfig_dir = paths::dirname(tsconfig_path);
        let base_url = match tsconfig.compiler_options.base_url {
            Some(base_url) => paths::resolve(&tsconfig_dir, base_url),
            None => tsconfig_dir,
        };

        let mappings = raw_paths
            .into_iter()
            .map(|(pattern, targets)| {
                let templates = match targets {
                    Value::Array(items) => items
                        .into_iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect(),
                    Value::String(single) => vec![single],
                    _ => Vec::new(),
                };
                (pattern, templates)
            })
            .collect();

        Ok(Some(Self::new(base_url, mappings)))
    }
}

/// Split `pattern` at its first `*`.
///
/// Returns `(prefix, postfix, has_wildcard)`.
pub fn split_on_star(pattern: &str) -> (&str, &str, bool) {
    match pattern.split_once('*') {
        Some((prefix, postfix)) => (prefix, postfix, true),
        None => (pattern, "", false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgtrace_fs::MemoryFileSystem;

    #[test]
    fn test_split_on_star() {
        assert_eq!(split_on_star("lib/*"), ("lib/", "", true));
        assert_eq!(split_on_star("@app/*/public"), ("@app/", "/public", true));
        assert_eq!(split_on_star("exact"), ("exact", "", false));
    }

    #[test]
    fn test_from_tsconfig() {
        let fs = MemoryFileSystem::new();
        fs.add_file(
            "/proj/tsconfig.json",
            r#"{"compilerOptions": {"baseUrl": "./dist", "paths": {"@lib/*": ["lib/*", "gen/*"], "*": ["vendor/*"]}}}"#,
        );

        let mappings = PathMappings::from_tsconfig(&fs, Path::new("/proj/tsconfig.json"))
            .unwrap()
            .unwrap();
        assert_eq!(mappings.base_url, PathBuf::from("/proj/dist"));
        assert_eq!(
            mappings.paths,
            vec![
                ("@lib/*".to_string(), vec!["lib/*".to_string(), "gen/*".to_string()]),
                ("*".to_string(), vec!["vendor/*".to_string()]),
            ]
        );
    }

    #[test]
    fn test_tsconfig_without_paths() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/tsconfig.json", r#"{"compilerOptions": {"strict": true}}"#);
        assert_eq!(
            PathMappings::from_tsconfig(&fs, Path::new("/proj/tsconfig.json")).unwrap(),
            None
        );
    }

    #[test]
    fn test_missing_base_url_defaults_to_tsconfig_dir() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/tsconfig.json", r#"{"compilerOptions": {"paths": {"x": ["src/x"]}}}"#);
        let mappings = PathMappings::from_tsconfig(&fs, Path::new("/proj/tsconfig.json"))
            .unwrap()
            .unwrap();
        assert_eq!(mappings.base_url, PathBuf::from("/proj"));
    }
}
