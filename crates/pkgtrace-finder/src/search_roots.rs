//! Search roots
//!
//! The directories a full scan starts from: the primary source directory plus
//! every directory reachable through the path-mapping templates.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use pkgtrace_fs::{paths, FileKind, FileSystem};
use pkgtrace_packages::path_mappings::split_on_star;
use pkgtrace_packages::PathMappings;

/// Compute the deduplicated search roots for `source_directory`.
///
/// The primary root is always first, even when a mapped directory contains it.
pub fn get_base_paths(
    fs: &dyn FileSystem,
    source_directory: &Path,
    path_mappings: Option<&PathMappings>,
) -> Vec<PathBuf> {
    let mut base_paths = vec![source_directory.to_path_buf()];

    if let Some(mappings) = path_mappings {
        let base_url = paths::normalize(&mappings.base_url);
        if paths::is_root(&base_url) {
            warn!(
                "The provided path mappings baseUrl is the root path {}.\n\
                 This is likely to mess up how entry points are found and is probably not correct.\n\
                 Please check your path mappings configuration such as in the tsconfig.json file.",
                base_url.display()
            );
        }

        for templates in mappings.paths.iter().map(|(_, templates)| templates) {
            for template in templates {
                collect_template_roots(fs, &base_url, template, &mut base_paths);
            }
        }
    }

    let mut deduped = paths::dedupe_paths(&base_paths);
    if !deduped.iter().any(|path| path == source_directory) {
        deduped.insert(0, source_directory.to_path_buf());
    }
    deduped
}

fn collect_template_roots(fs: &dyn FileSystem, base_url: &Path, template: &str, base_paths: &mut Vec<PathBuf>) {
    let (prefix, _, has_wildcard) = split_on_star(template);
    let mut base_path = paths::resolve(base_url, prefix);
    if fs.is_file(&base_path) {
        base_path = paths::dirname(&base_path);
    }

    let mut found = false;
    if fs.exists(&base_path) {
        base_paths.push(base_path.clone());
        found = true;
    }

    if has_wildcard {
        let container = paths::dirname(&base_path);
        let wildcard_prefix = paths::basename(&base_path);
        if fs.is_directory(&container) {
            let candidates = match fs.read_dir(&container) {
                Ok(candidates) => candidates,
                Err(e) => {
                    debug!("Could not read {}: {}", container.display(), e);
                    Vec::new()
                }
            };
            for candidate in candidates.iter().filter(|name| name.starts_with(wildcard_prefix)) {
                let candidate_path = container.join(candidate);
                if matches!(fs.stat(&candidate_path), Ok(FileKind::Directory)) {
                    base_paths.push(candidate_path);
                    found = true;
                }
            }
        }
    }

    if !found {
        debug!(
            "The base path {} computed from baseUrl {} and path mapping \"{}\" does not exist in the file-system.\n\
             It will not be scanned for entry points.",
            base_path.display(),
            base_url.display(),
            template
        );
    }
}
