//! Entry-point descriptor reader
//!
//! Classifies a candidate directory as one of [`EntryPointInfo`]'s variants
//! by reading the package descriptor and project configuration.

use std::path::{Path, PathBuf};

use log::debug;
use pkgtrace_fs::{paths, FileSystem};

use crate::build_marker::has_been_processed;
use crate::config::ProjectConfig;
use crate::package_json::{parse_package_json, FormatProperty, PackageJson, PACKAGE_JSON};

/// Directory holding a package's installed dependencies.
pub const NODE_MODULES: &str = "node_modules";

/// Directory the tool writes its own output into; never scanned.
pub const TOOL_DIRECTORY: &str = "__pkgtrace__";

/// A compilable surface of a package.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    /// Package name joined with the entry point's sub-path, e.g. `@scope/lib/testing`.
    pub name: String,
    pub path: PathBuf,
    pub package_name: String,
    pub package_path: PathBuf,
    pub package_json: PackageJson,
    /// Absolute path of the declaration file.
    pub typings: PathBuf,
    pub ignore_missing_dependencies: bool,
    pub generate_deep_reexports: bool,
}

impl EntryPoint {
    /// Format properties this entry point declares, with their bundle paths.
    pub fn declared_formats(&self) -> impl Iterator<Item = (FormatProperty, &str)> {
        FormatProperty::ALL
            .into_iter()
            .filter_map(|property| self.package_json.format_path(property).map(|path| (property, path)))
    }

    pub fn is_format_processed(&self, property: FormatProperty) -> bool {
        has_been_processed(&self.package_json, property)
    }

    /// Whether any declared format was already processed.
    pub fn is_processed(&self) -> bool {
        self.declared_formats()
            .any(|(property, _)| self.is_format_processed(property))
    }
}

/// Outcome of classifying a candidate path.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryPointInfo {
    /// No descriptor and no configuration: not an entry point.
    NotAUnit,
    /// A descriptor exists but is unusable (malformed or without typings).
    Incompatible,
    /// Configuration asks for this entry point to be skipped.
    Ignored,
    Valid(EntryPoint),
}

impl EntryPointInfo {
    pub fn is_entry_point(&self) -> bool {
        matches!(self, EntryPointInfo::Valid(_))
    }

    pub fn as_entry_point(&self) -> Option<&EntryPoint> {
        match self {
            EntryPointInfo::Valid(entry_point) => Some(entry_point),
            _ => None,
        }
    }

    /// Whether a directory with this classification may hold further entry points.
    pub fn can_contain_entry_points(&self) -> bool {
        matches!(self, EntryPointInfo::NotAUnit | EntryPointInfo::Incompatible)
    }
}

/// Classify `entry_point_path` as an entry point of the package at `package_path`.
pub fn get_entry_point_info(
    fs: &dyn FileSystem,
    config: &ProjectConfig,
    package_path: &Path,
    entry_point_path: &Path,
) -> EntryPointInfo {
    let package_package_json = load_optional(fs, &package_path.join(PACKAGE_JSON));
    let package_name = package_package_json
        .as_ref()
        .and_then(|pkg| pkg.name.clone())
        .unwrap_or_else(|| guess_package_name(package_path));

    let package_config = config.get_package_config(fs, &package_name, package_path);
    let entry_point_config = package_config.entry_point(entry_point_path);
    let entry_point_json_path = entry_point_path.join(PACKAGE_JSON);
    let has_descriptor = fs.exists(&entry_point_json_path);

    if entry_point_config.is_none() && !has_descriptor {
        return EntryPointInfo::NotAUnit;
    }
    if entry_point_config.map_or(false, |c| c.ignore) {
        return EntryPointInfo::Ignored;
    }

    let name = entry_point_name(&package_name, package_path, entry_point_path);
    let loaded = if has_descriptor {
        match parse_package_json(fs, &entry_point_json_path) {
            Ok(pkg) => Some(pkg),
            Err(e) if entry_point_config.is_none() => {
                debug!("Incompatible entry point {}: {}", entry_point_path.display(), e);
                return EntryPointInfo::Incompatible;
            }
            Err(e) => {
                debug!(
                    "Replacing unreadable descriptor of {} with its configuration: {}",
                    entry_point_path.display(),
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let base = loaded.unwrap_or_else(|| PackageJson {
        name: Some(name.clone()),
        ..PackageJson::default()
    });
    let package_json = match entry_point_config.and_then(|c| c.overrides.as_ref()) {
        Some(overrides) => match base.merged_with(overrides) {
            Ok(merged) => merged,
            Err(e) => {
                debug!(
                    "Configuration override for {} is not a valid descriptor: {}",
                    entry_point_path.display(),
                    e
                );
                return EntryPointInfo::Incompatible;
            }
        },
        None => base,
    };

    let typings = match package_json
        .declared_typings()
        .map(str::to_string)
        .or_else(|| guess_typings(fs, &package_json, entry_point_path))
    {
        Some(typings) => typings,
        None => {
            debug!("Entry point {} declares no typings", entry_point_path.display());
            return EntryPointInfo::Incompatible;
        }
    };

    EntryPointInfo::Valid(EntryPoint {
        name,
        path: entry_point_path.to_path_buf(),
        package_name,
        package_path: package_path.to_path_buf(),
        typings: paths::resolve(entry_point_path, typings),
        ignore_missing_dependencies: entry_point_config.map_or(false, |c| c.ignore_missing_dependencies),
        generate_deep_reexports: entry_point_config.map_or(false, |c| c.generate_deep_reexports),
        package_json,
    })
}

fn load_optional(fs: &dyn FileSystem, path: &Path) -> Option<PackageJson> {
    if !fs.exists(path) {
        return None;
    }
    parse_package_json(fs, path).ok()
}

/// Guess the package name from its install location, honouring scopes.
fn guess_package_name(package_path: &Path) -> String {
    let segments = paths::split_path(package_path);
    if let Some(index) = segments.iter().rposition(|s| s == NODE_MODULES) {
        let rest = &segments[index + 1..];
        match rest {
            [scope, name, ..] if scope.starts_with('@') => return format!("{}/{}", scope, name),
            [name, ..] => return name.clone(),
            [] => {}
        }
    }
    paths::basename(package_path).to_string()
}

fn entry_point_name(package_name: &str, package_path: &Path, entry_point_path: &Path) -> String {
    let sub_path = paths::split_path(&paths::relative(package_path, entry_point_path));
    if sub_path.is_empty() {
        package_name.to_string()
    } else {
        format!("{}/{}", package_name, sub_path.join("/"))
    }
}

/// Look for a `.d.ts` next to any declared bundle.
fn guess_typings(fs: &dyn FileSystem, package_json: &PackageJson, entry_point_path: &Path) -> Option<String> {
    FormatProperty::ALL.into_iter().find_map(|property| {
        let bundle = package_json.format_path(property)?;
        let typings = format!("{}.d.ts", paths::strip_js_extension(bundle)?);
        fs.exists(&paths::resolve(entry_point_path, &typings))
            .then_some(typings)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_marker::TOOL_VERSION;
    use pkgtrace_fs::MemoryFileSystem;

    const PKG: &str = "/project/node_modules/lib";

    fn classify(fs: &MemoryFileSystem, config: &ProjectConfig, entry_point_path: &str) -> EntryPointInfo {
        get_entry_point_info(fs, config, Path::new(PKG), Path::new(entry_point_path))
    }

    #[test]
    fn test_no_descriptor_is_not_a_unit() {
        let fs = MemoryFileSystem::new();
        fs.add_dir(PKG);
        let config = ProjectConfig::empty("/project");
        assert_eq!(classify(&fs, &config, PKG), EntryPointInfo::NotAUnit);
    }

    #[test]
    fn test_valid_primary_entry_point() {
        let fs = MemoryFileSystem::new();
        fs.add_file(
            "/project/node_modules/lib/package.json",
            r#"{"name": "lib", "typings": "./index.d.ts", "fesm2015": "./fesm2015/lib.js"}"#,
        );
        let config = ProjectConfig::empty("/project");

        let info = classify(&fs, &config, PKG);
        let entry_point = info.as_entry_point().unwrap();
        assert_eq!(entry_point.name, "lib");
        assert_eq!(entry_point.package_name, "lib");
        assert_eq!(entry_point.typings, PathBuf::from("/project/node_modules/lib/index.d.ts"));
        assert_eq!(
            entry_point.declared_formats().collect::<Vec<_>>(),
            vec![(FormatProperty::Fesm2015, "./fesm2015/lib.js")]
        );
        assert!(!entry_point.is_processed());
    }

    #[test]
    fn test_secondary_entry_point_name() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/project/node_modules/lib/package.json", r#"{"name": "lib", "typings": "index.d.ts"}"#);
        fs.add_file("/project/node_modules/lib/http/testing/package.json", r#"{"typings": "t.d.ts"}"#);
        let config = ProjectConfig::empty("/project");

        let info = classify(&fs, &config, "/project/node_modules/lib/http/testing");
        assert_eq!(info.as_entry_point().unwrap().name, "lib/http/testing");
    }

    #[test]
    fn test_malformed_descriptor_is_incompatible() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/project/node_modules/lib/package.json", "{ broken");
        let config = ProjectConfig::empty("/project");
        assert_eq!(classify(&fs, &config, PKG), EntryPointInfo::Incompatible);
    }

    #[test]
    fn test_missing_typings_is_incompatible() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/project/node_modules/lib/package.json", r#"{"name": "lib", "main": "index.js"}"#);
        let config = ProjectConfig::empty("/project");
        assert_eq!(classify(&fs, &config, PKG), EntryPointInfo::Incompatible);
    }

    #[test]
    fn test_typings_guessed_from_bundle() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/project/node_modules/lib/package.json", r#"{"name": "lib", "main": "./lib.js"}"#);
        fs.add_file("/project/node_modules/lib/lib.d.ts", "");
        let config = ProjectConfig::empty("/project");

        let info = classify(&fs, &config, PKG);
        assert_eq!(
            info.as_entry_point().unwrap().typings,
            PathBuf::from("/project/node_modules/lib/lib.d.ts")
        );
    }

    #[test]
    fn test_configured_entry_points() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/project/node_modules/lib/package.json", r#"{"name": "lib", "typings": "index.d.ts"}"#);
        fs.add_dir("/project/node_modules/lib/testing");
        fs.add_dir("/project/node_modules/lib/extra");
        let config = ProjectConfig::from_source(
            Path::new("/project"),
            r#"{"packages": {"lib": {"entryPoints": {
                "./testing": {"ignore": true},
                "./extra": {"override": {"typings": "./extra.d.ts"}, "ignoreMissingDependencies": true}
            }}}}"#,
        )
        .unwrap();

        assert_eq!(classify(&fs, &config, "/project/node_modules/lib/testing"), EntryPointInfo::Ignored);

        let extra = classify(&fs, &config, "/project/node_modules/lib/extra");
        let extra = extra.as_entry_point().unwrap();
        assert_eq!(extra.name, "lib/extra");
        assert!(extra.ignore_missing_dependencies);
        assert_eq!(extra.typings, PathBuf::from("/project/node_modules/lib/extra/extra.d.ts"));
    }

    #[test]
    fn test_scoped_package_name_is_guessed() {
        assert_eq!(guess_package_name(Path::new("/p/node_modules/@scope/lib")), "@scope/lib");
        assert_eq!(guess_package_name(Path::new("/p/node_modules/lib/nested")), "lib");
        assert_eq!(guess_package_name(Path::new("/dist/lib")), "lib");
    }

    #[test]
    fn test_processed_markers_are_visible() {
        let fs = MemoryFileSystem::new();
        fs.add_file(
            "/project/node_modules/lib/package.json",
            &format!(
                r#"{{"name": "lib", "typings": "index.d.ts", "main": "index.js", "__processed_by_pkgtrace__": {{"main": "{}"}}}}"#,
                TOOL_VERSION
            ),
        );
        let config = ProjectConfig::empty("/project");
        let info = classify(&fs, &config, PKG);
        let entry_point = info.as_entry_point().unwrap();
        assert!(entry_point.is_format_processed(FormatProperty::Main));
        assert!(entry_point.is_processed());
    }
}
