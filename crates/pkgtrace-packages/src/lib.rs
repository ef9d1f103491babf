//! Package descriptors, project configuration and entry-point classification

pub mod build_marker;
pub mod config;
pub mod entry_point;
pub mod package_json;
pub mod path_mappings;

pub use build_marker::{has_been_processed, mark_as_processed, TOOL_VERSION};
pub use config::{ConfigError, EntryPointConfig, PackageConfig, ProjectConfig};
pub use entry_point::{get_entry_point_info, EntryPoint, EntryPointInfo, NODE_MODULES, TOOL_DIRECTORY};
pub use package_json::{parse_package_json, FormatProperty, PackageJson, PackageJsonError, PACKAGE_JSON};
pub use path_mappings::PathMappings;
