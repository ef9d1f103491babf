//! Package.json parser
//!
//! Typed view over the package descriptor. Unknown keys are preserved in
//! `extra` so a descriptor can be merged with configuration overrides and
//! written back without losing data.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pkgtrace_fs::FileSystem;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// File name of the package descriptor.
pub const PACKAGE_JSON: &str = "package.json";

#[derive(Debug, Error)]
pub enum PackageJsonError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A property of `package.json` that points at one bundle format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatProperty {
    Fesm2015,
    Fesm5,
    Es2015,
    Esm2015,
    Esm5,
    Main,
    Module,
    Browser,
}

impl FormatProperty {
    /// Every format property, in the order they are preferred.
    pub const ALL: [FormatProperty; 8] = [
        FormatProperty::Fesm2015,
        FormatProperty::Fesm5,
        FormatProperty::Es2015,
        FormatProperty::Esm2015,
        FormatProperty::Esm5,
        FormatProperty::Main,
        FormatProperty::Module,
        FormatProperty::Browser,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormatProperty::Fesm2015 => "fesm2015",
            FormatProperty::Fesm5 => "fesm5",
            FormatProperty::Es2015 => "es2015",
            FormatProperty::Esm2015 => "esm2015",
            FormatProperty::Esm5 => "esm5",
            FormatProperty::Main => "main",
            FormatProperty::Module => "module",
            FormatProperty::Browser => "browser",
        }
    }
}

impl fmt::Display for FormatProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatProperty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatProperty::ALL
            .iter()
            .copied()
            .find(|property| property.as_str() == s)
            .ok_or_else(|| format!("unknown format property '{}'", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageJson {
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub typings: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub types: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub fesm2015: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub fesm5: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub es2015: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub esm2015: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub esm5: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    // `browser` may also be a replacement map; only the string form names a bundle.
    #[serde(default, deserialize_with = "string_field", skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    /// Format property -> tool version that processed it.
    #[serde(
        rename = "__processed_by_pkgtrace__",
        default,
        deserialize_with = "string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub processed_by: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accept any JSON value, keeping it only when it is a string.
fn string_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Accept any JSON value, keeping the string entries of an object.
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(version) => Some((key, version)),
                _ => None,
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

impl PackageJson {
    /// Path of the bundle declared for `property`, if any.
    pub fn format_path(&self, property: FormatProperty) -> Option<&str> {
        let value = match property {
            FormatProperty::Fesm2015 => &self.fesm2015,
            FormatProperty::Fesm5 => &self.fesm5,
            FormatProperty::Es2015 => &self.es2015,
            FormatProperty::Esm2015 => &self.esm2015,
            FormatProperty::Esm5 => &self.esm5,
            FormatProperty::Main => &self.main,
            FormatProperty::Module => &self.module,
            FormatProperty::Browser => &self.browser,
        };
        value.as_deref()
    }

    /// Declared typings, `typings` winning over `types`.
    pub fn declared_typings(&self) -> Option<&str> {
        self.typings.as_deref().or(self.types.as_deref())
    }

    /// Return a copy with every key of `overrides` replacing this descriptor's.
    pub fn merged_with(&self, overrides: &Value) -> Result<PackageJson, serde_json::Error> {
        let mut merged = serde_json::to_value(self)?;
        if let (Value::Object(target), Value::Object(source)) = (&mut merged, overrides) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(merged)
    }
}

/// Parse a package.json file
pub fn parse_package_json(fs: &dyn FileSystem, path: &Path) -> Result<PackageJson, PackageJsonError> {
    let content = fs.read_to_string(path).map_err(|source| PackageJsonError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_package_json_str(&content).map_err(|source| PackageJsonError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse package.json from string content
pub fn parse_package_json_str(content: &str) -> Result<PackageJson, serde_json::Error> {
    serde_json::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_marker::PROCESSED_MARKER_KEY;
    use pkgtrace_fs::MemoryFileSystem;

    #[test]
    fn test_parse_simple_package_json() {
        let json = r#"{
            "name": "test-package",
            "version": "1.0.0",
            "main": "index.js",
            "typings": "index.d.ts"
        }"#;

        let pkg = parse_package_json_str(json).unwrap();
        assert_eq!(pkg.name.as_deref(), Some("test-package"));
        assert_eq!(pkg.version.as_deref(), Some("1.0.0"));
        assert_eq!(pkg.format_path(FormatProperty::Main), Some("index.js"));
        assert_eq!(pkg.declared_typings(), Some("index.d.ts"));
    }

    #[test]
    fn test_types_is_an_alias_for_typings() {
        let pkg = parse_package_json_str(r#"{"types": "lib.d.ts"}"#).unwrap();
        assert_eq!(pkg.declared_typings(), Some("lib.d.ts"));
    }

    #[test]
    fn test_non_string_format_fields_are_ignored() {
        let json = r#"{"name": "x", "browser": {"./a.js": false}, "config": {"port": 3000}}"#;
        let pkg = parse_package_json_str(json).unwrap();
        assert_eq!(pkg.browser, None);
        assert!(pkg.extra.contains_key("config"));
    }

    #[test]
    fn test_processed_markers() {
        let json = r#"{"name": "x", "__processed_by_pkgtrace__": {"fesm2015": "0.1.0"}}"#;
        let pkg = parse_package_json_str(json).unwrap();
        assert_eq!(pkg.processed_by.get("fesm2015").map(String::as_str), Some("0.1.0"));
        assert!(!pkg.extra.contains_key(PROCESSED_MARKER_KEY));
    }

    #[test]
    fn test_malformed_processed_markers_are_dropped() {
        let json = r#"{"name": "x", "__processed_by_pkgtrace__": {"main": "0.1.0", "module": 3, "esm5": null}}"#;
        let pkg = parse_package_json_str(json).unwrap();
        assert_eq!(pkg.name.as_deref(), Some("x"));
        assert_eq!(pkg.processed_by.len(), 1);
        assert_eq!(pkg.processed_by.get("main").map(String::as_str), Some("0.1.0"));

        let pkg = parse_package_json_str(r#"{"name": "x", "__processed_by_pkgtrace__": true}"#).unwrap();
        assert!(pkg.processed_by.is_empty());
    }

    #[test]
    fn test_merged_with_overrides() {
        let pkg = parse_package_json_str(r#"{"name": "x", "main": "a.js", "custom": 1}"#).unwrap();
        let merged = pkg
            .merged_with(&serde_json::json!({"main": "b.js", "typings": "b.d.ts"}))
            .unwrap();
        assert_eq!(merged.main.as_deref(), Some("b.js"));
        assert_eq!(merged.typings.as_deref(), Some("b.d.ts"));
        assert_eq!(merged.extra.get("custom"), Some(&Value::from(1)));
    }

    #[test]
    fn test_parse_errors() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/pkg/package.json", "{ not json");

        match parse_package_json(&fs, Path::new("/pkg/package.json")) {
            Err(PackageJsonError::Parse { path, .. }) => {
                assert_eq!(path, PathBuf::from("/pkg/package.json"))
            }
            other => panic!("Expected parse error, got {:?}", other),
        }
        assert!(matches!(
            parse_package_json(&fs, Path::new("/missing/package.json")),
            Err(PackageJsonError::Io { .. })
        ));
    }

    #[test]
    fn test_format_property_from_str() {
        assert_eq!("esm2015".parse::<FormatProperty>(), Ok(FormatProperty::Esm2015));
        assert!("typings".parse::<FormatProperty>().is_err());
        assert_eq!(FormatProperty::Fesm5.to_string(), "fesm5");
    }
}
