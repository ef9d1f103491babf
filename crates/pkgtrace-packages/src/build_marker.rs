//! Processing markers recorded in package.json

use log::debug;

use crate::package_json::{FormatProperty, PackageJson};

/// Version recorded against each format when it is processed.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Key of the marker object inside package.json.
pub const PROCESSED_MARKER_KEY: &str = "__processed_by_pkgtrace__";

/// Whether `property` of this descriptor was processed by this tool version.
///
/// A marker left by a different version counts as unprocessed.
pub fn has_been_processed(package_json: &PackageJson, property: FormatProperty) -> bool {
    match package_json.processed_by.get(property.as_str()) {
        Some(version) if version == TOOL_VERSION => true,
        Some(version) => {
            debug!(
                "'{}' of {} was processed by version {} (current {}), treating it as unprocessed",
                property,
                package_json.name.as_deref().unwrap_or("<unnamed>"),
                version,
                TOOL_VERSION
            );
            false
        }
        None => false,
    }
}

/// Record `properties` as processed by the current version.
pub fn mark_as_processed(package_json: &mut PackageJson, properties: &[FormatProperty]) {
    for property in properties {
        package_json
            .processed_by
            .insert(property.as_str().to_string(), TOOL_VERSION.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_json::parse_package_json_str;

    #[test]
    fn test_unmarked_is_unprocessed() {
        let pkg = parse_package_json_str(r#"{"name": "x", "main": "index.js"}"#).unwrap();
        assert!(!has_been_processed(&pkg, FormatProperty::Main));
    }

    #[test]
    fn test_mark_as_processed() {
        let mut pkg = parse_package_json_str(r#"{"name": "x", "main": "index.js"}"#).unwrap();
        mark_as_processed(&mut pkg, &[FormatProperty::Main]);
        assert!(has_been_processed(&pkg, FormatProperty::Main));
        assert!(!has_been_processed(&pkg, FormatProperty::Module));

        let json = serde_json::to_string(&pkg).unwrap();
        assert!(json.contains(PROCESSED_MARKER_KEY));
    }

    #[test]
    fn test_other_version_is_unprocessed() {
        let pkg = parse_package_json_str(
            r#"{"name": "x", "__processed_by_pkgtrace__": {"main": "0.0.0-old"}}"#,
        )
        .unwrap();
        assert!(!has_been_processed(&pkg, FormatProperty::Main));
    }
}
