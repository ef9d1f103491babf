//! Module resolution for import specifiers
//!
//! Resolves a specifier found in one bundle file to what it points at:
//! another file of the same package, the root of another entry point, or a
//! file deep inside another package.
//!
//! Resolution order:
//! 1. Relative specifiers (`./x`, `../x`) are tried with the postfixes
//!    `""`, `".js"` and `"/index.js"`.
//! 2. Bare specifiers are matched against the path mappings, longest prefix
//!    first.
//! 3. Bare specifiers are looked up in each `node_modules` directory from the
//!    importing file up to the filesystem root.

use std::path::{Path, PathBuf};

use pkgtrace_fs::{paths, FileSystem};
use pkgtrace_packages::path_mappings::split_on_star;
use pkgtrace_packages::{PathMappings, NODE_MODULES, PACKAGE_JSON};

/// Postfixes tried, in order, when resolving a path to a file.
pub const RELATIVE_EXTENSIONS: [&str; 3] = ["", ".js", "/index.js"];

/// Represents a resolved module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedModule {
    /// A file belonging to the importing package
    Relative(PathBuf),
    /// The directory of another entry point
    External(PathBuf),
    /// A path inside another package that is not itself an entry point
    DeepImport(PathBuf),
}

#[derive(Debug, Clone)]
struct Matcher {
    prefix: String,
    postfix: String,
    has_wildcard: bool,
}

impl Matcher {
    fn parse(pattern: &str) -> Self {
        let (prefix, postfix, has_wildcard) = split_on_star(pattern);
        Self {
            prefix: prefix.to_string(),
            postfix: postfix.to_string(),
            has_wildcard,
        }
    }

    /// The text the wildcard stands for, or `""` for an exact match.
    fn matches<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        if self.has_wildcard {
            specifier
                .strip_prefix(self.prefix.as_str())?
                .strip_suffix(self.postfix.as_str())
        } else if specifier == self.prefix {
            Some("")
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
struct ProcessedMapping {
    matcher: Matcher,
    templates: Vec<Matcher>,
}

/// Module resolver handles import path resolution
pub struct ModuleResolver<'a> {
    fs: &'a dyn FileSystem,
    base_url: PathBuf,
    mappings: Vec<ProcessedMapping>,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(fs: &'a dyn FileSystem, path_mappings: Option<&PathMappings>) -> Self {
        let (base_url, mappings) = match path_mappings {
            Some(path_mappings) => (
                path_mappings.base_url.clone(),
                path_mappings
                    .paths
                    .iter()
                    .map(|(pattern, templates)| ProcessedMapping {
                        matcher: Matcher::parse(pattern),
                        templates: templates.iter().map(|t| Matcher::parse(t)).collect(),
                    })
                    .collect(),
            ),
            None => (PathBuf::new(), Vec::new()),
        };
        Self {
            fs,
            base_url,
            mappings,
        }
    }

    /// Resolve `specifier`, imported from the file `from_file`.
    ///
    /// Returns `None` when nothing on disk matches.
    pub fn resolve_module_import(&self, specifier: &str, from_file: &Path) -> Option<ResolvedModule> {
        if is_relative_specifier(specifier) {
            return self.resolve_as_relative_path(specifier, from_file);
        }
        self.resolve_by_path_mappings(specifier, from_file)
            .or_else(|| self.resolve_as_entry_point(specifier, from_file))
    }

    fn resolve_as_relative_path(&self, specifier: &str, from_file: &Path) -> Option<ResolvedModule> {
        let target = paths::resolve(&paths::dirname(from_file), specifier);
        self.resolve_path(&target).map(ResolvedModule::Relative)
    }

    fn resolve_by_path_mappings(&self, specifier: &str, from_file: &Path) -> Option<ResolvedModule> {
        let mapped_paths = self.find_mapped_paths(specifier);
        if mapped_paths.is_empty() {
            return None;
        }
        let package_path = self.find_package_path(from_file)?;

        for mapped_path in mapped_paths {
            if self.is_entry_point(&mapped_path) {
                return Some(ResolvedModule::External(mapped_path));
            }
            if let Some(file) = self.resolve_path(&mapped_path) {
                // A deep import names the mapped path, like the node_modules lookup does.
                return Some(if paths::is_path_contained_by(&package_path, &mapped_path) {
                    ResolvedModule::Relative(file)
                } else {
                    ResolvedModule::DeepImport(mapped_path)
                });
            }
        }
        None
    }

    fn resolve_as_entry_point(&self, specifier: &str, from_file: &Path) -> Option<ResolvedModule> {
        let mut folder = from_file.to_path_buf();
        while !paths::is_root(&folder) {
            folder = paths::dirname(&folder);
            // A nested cache is a sibling of the package that owns it.
            if paths::basename(&folder) == NODE_MODULES {
                folder = paths::dirname(&folder);
            }
            let module_path = paths::resolve(&folder.join(NODE_MODULES), specifier);
            if self.is_entry_point(&module_path) {
                return Some(ResolvedModule::External(module_path));
            }
            if self.resolve_path(&module_path).is_some() {
                return Some(ResolvedModule::DeepImport(module_path));
            }
        }
        None
    }

    /// Candidate paths of every template of the best matching mapping.
    fn find_mapped_paths(&self, specifier: &str) -> Vec<PathBuf> {
        let mut best: Option<(&ProcessedMapping, &str)> = None;
        for mapping in &self.mappings {
            let Some(matched) = mapping.matcher.matches(specifier) else {
                continue;
            };
            let is_better = match best {
                Some((current, _)) => mapping.matcher.prefix.len() > current.matcher.prefix.len(),
                None => true,
            };
            if is_better {
                best = Some((mapping, matched));
            }
        }

        match best {
            Some((mapping, matched)) => mapping
                .templates
                .iter()
                .map(|template| {
                    let path = if template.has_wildcard {
                        format!("{}{}{}", template.prefix, matched, template.postfix)
                    } else {
                        template.prefix.clone()
                    };
                    paths::resolve(&self.base_url, path)
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Closest ancestor directory holding a package.json.
    fn find_package_path(&self, path: &Path) -> Option<PathBuf> {
        let mut folder = path.to_path_buf();
        while !paths::is_root(&folder) {
            folder = paths::dirname(&folder);
            if self.fs.exists(&folder.join(PACKAGE_JSON)) {
                return Some(folder);
            }
        }
        None
    }

    fn is_entry_point(&self, path: &Path) -> bool {
        self.fs.exists(&path.join(PACKAGE_JSON))
    }

    /// First `path + postfix` that is a file.
    pub fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
        resolve_file_with_postfixes(self.fs, path, &RELATIVE_EXTENSIONS)
    }
}

/// First `path + postfix` that exists as a file.
pub fn resolve_file_with_postfixes(fs: &dyn FileSystem, path: &Path, postfixes: &[&str]) -> Option<PathBuf> {
    postfixes.iter().find_map(|postfix| {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(postfix);
        let candidate = PathBuf::from(candidate);
        fs.is_file(&candidate).then_some(candidate)
    })
}

fn is_relative_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier.starts_with('/')
}

/// Check if a specifier names a Node.js built-in module
pub fn is_builtin(specifier: &str) -> bool {
    let name = specifier.strip_prefix("node:").unwrap_or(specifier);
    let root = name.split('/').next().unwrap_or(name);
    matches!(
        root,
        "fs" | "path" | "http" | "https" | "http2" | "os" | "process" | "events" | "url"
            | "crypto" | "util" | "stream" | "buffer" | "child_process" | "cluster" | "net"
            | "tls" | "dns" | "dgram" | "querystring" | "readline" | "repl" | "assert" | "zlib"
            | "vm" | "v8" | "tty" | "module" | "perf_hooks" | "worker_threads" | "timers"
            | "string_decoder" | "punycode" | "console" | "constants" | "domain"
            | "async_hooks" | "inspector"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkgtrace_fs::MemoryFileSystem;

    fn fixture() -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/node_modules/lib/package.json", "{}");
        fs.add_file("/proj/node_modules/lib/index.js", "");
        fs.add_file("/proj/node_modules/lib/src/util.js", "");
        fs.add_file("/proj/node_modules/lib/sub/index.js", "");
        fs.add_file("/proj/node_modules/lib/node_modules/nested/package.json", "{}");
        fs.add_file("/proj/node_modules/@scope/pkg/package.json", "{}");
        fs.add_file("/proj/node_modules/@scope/pkg/testing/package.json", "{}");
        fs
    }

    #[test]
    fn test_relative_resolution() {
        let fs = fixture();
        let resolver = ModuleResolver::new(&fs, None);
        let from = Path::new("/proj/node_modules/lib/index.js");

        assert_eq!(
            resolver.resolve_module_import("./src/util", from),
            Some(ResolvedModule::Relative(PathBuf::from("/proj/node_modules/lib/src/util.js")))
        );
        assert_eq!(
            resolver.resolve_module_import("./sub", from),
            Some(ResolvedModule::Relative(PathBuf::from("/proj/node_modules/lib/sub/index.js")))
        );
        assert_eq!(resolver.resolve_module_import("./missing", from), None);
    }

    #[test]
    fn test_external_entry_points() {
        let fs = fixture();
        let resolver = ModuleResolver::new(&fs, None);
        let from = Path::new("/proj/node_modules/lib/index.js");

        assert_eq!(
            resolver.resolve_module_import("@scope/pkg/testing", from),
            Some(ResolvedModule::External(PathBuf::from("/proj/node_modules/@scope/pkg/testing")))
        );
        assert_eq!(
            resolver.resolve_module_import("nested", Path::new("/proj/node_modules/lib/src/util.js")),
            Some(ResolvedModule::External(PathBuf::from("/proj/node_modules/lib/node_modules/nested")))
        );
        assert_eq!(resolver.resolve_module_import("unknown", from), None);
    }

    #[test]
    fn test_deep_import() {
        let fs = fixture();
        let resolver = ModuleResolver::new(&fs, None);
        assert_eq!(
            resolver.resolve_module_import("lib/src/util", Path::new("/proj/node_modules/@scope/pkg/index.js")),
            Some(ResolvedModule::DeepImport(PathBuf::from("/proj/node_modules/lib/src/util")))
        );
    }

    #[test]
    fn test_path_mappings_longest_prefix_wins() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/package.json", "{}");
        fs.add_file("/proj/src/app.js", "");
        fs.add_file("/proj/dist/lib/core/package.json", "{}");
        fs.add_file("/proj/dist/special/core/package.json", "{}");
        let mappings = PathMappings::new(
            "/proj",
            vec![
                ("@app/*".to_string(), vec!["dist/lib/*".to_string()]),
                ("@app/core".to_string(), vec!["dist/special/core".to_string()]),
            ],
        );
        let resolver = ModuleResolver::new(&fs, Some(&mappings));

        let from = Path::new("/proj/src/app.js");
        assert_eq!(
            resolver.resolve_module_import("@app/core", from),
            Some(ResolvedModule::External(PathBuf::from("/proj/dist/special/core")))
        );
        assert_eq!(resolver.resolve_module_import("@app/other", from), None);
    }

    #[test]
    fn test_mapped_file_inside_own_package_is_relative() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/package.json", "{}");
        fs.add_file("/proj/src/app.js", "");
        fs.add_file("/proj/src/shared/util.js", "");
        let mappings = PathMappings::new("/proj", vec![("~/*".to_string(), vec!["src/*".to_string()])]);
        let resolver = ModuleResolver::new(&fs, Some(&mappings));

        assert_eq!(
            resolver.resolve_module_import("~/shared/util", Path::new("/proj/src/app.js")),
            Some(ResolvedModule::Relative(PathBuf::from("/proj/src/shared/util.js")))
        );
    }

    #[test]
    fn test_mapped_file_in_other_package_is_deep_import() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/proj/app/package.json", "{}");
        fs.add_file("/proj/app/index.js", "");
        fs.add_file("/proj/dist/lib/package.json", "{}");
        fs.add_file("/proj/dist/lib/internal/helpers.js", "");
        let mappings = PathMappings::new("/proj/dist", vec![("@lib/*".to_string(), vec!["lib/*".to_string()])]);
        let resolver = ModuleResolver::new(&fs, Some(&mappings));

        assert_eq!(
            resolver.resolve_module_import("@lib/internal/helpers", Path::new("/proj/app/index.js")),
            Some(ResolvedModule::DeepImport(PathBuf::from("/proj/dist/lib/internal/helpers")))
        );
    }

    #[test]
    fn test_builtin_detection() {
        assert!(is_builtin("fs"));
        assert!(is_builtin("node:path"));
        assert!(is_builtin("fs/promises"));
        assert!(!is_builtin("./local"));
        assert!(!is_builtin("my-package"));
    }
}
